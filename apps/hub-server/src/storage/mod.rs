// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! # Storage Module
//!
//! Persistent state owned by this server: the market ledger that payment
//! settlement writes to. Collections, inventory, leaderboard and daily
//! reward data live in their own services.
//!
//! ## Startup
//!
//! [`init_market_store`] opens the database once at startup. A failure is
//! logged and the server keeps running without a ledger (market routes
//! answer 503, settlement reports [`SettlementError::Unavailable`]) unless
//! `DB_FAIL_FAST` is set.

pub mod market;
pub mod settlement;

use std::sync::Arc;

use tracing::{error, info};

pub use market::{ListingStatus, MarketDatabase, MarketDbError, StoredListing};
pub use settlement::{PaymentSettlement, SettlementError, SettlementStatus, UnavailableSettlement};

use crate::config::Config;

/// Open the market database. `Ok(None)` means it failed and soft-fail is on.
pub fn init_market_store(config: &Config) -> Result<Option<MarketDatabase>, MarketDbError> {
    match MarketDatabase::open(&config.database_path) {
        Ok(db) => {
            info!(
                path = %config.database_path.display(),
                "Market database tables created or verified"
            );
            Ok(Some(db))
        }
        Err(e) if config.db_fail_fast => Err(e),
        Err(e) => {
            error!(
                path = %config.database_path.display(),
                error = %e,
                "Market database initialisation failed; payments cannot be settled"
            );
            Ok(None)
        }
    }
}

/// Settlement backend for an optional ledger.
pub fn settlement_backend(market: Option<&MarketDatabase>) -> Arc<dyn PaymentSettlement> {
    match market {
        Some(db) => Arc::new(db.clone()),
        None => Arc::new(UnavailableSettlement),
    }
}
