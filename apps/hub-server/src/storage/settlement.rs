// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! Settlement callback invoked after Telegram confirms a payment.

use async_trait::async_trait;
use serde_json::Value;

use super::market::MarketDbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStatus {
    Settled,
    /// Listing was already sold to this buyer; nothing changed.
    AlreadySettled,
}

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("listing {0} not found")]
    ListingNotFound(String),

    #[error("listing {0} was already sold to another buyer")]
    AlreadySold(String),

    #[error("invalid {field}: {value}")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("market database unavailable")]
    Unavailable,

    #[error(transparent)]
    Storage(#[from] MarketDbError),
}

/// Market-side operation that finalizes a purchase once paid.
#[async_trait]
pub trait PaymentSettlement: Send + Sync {
    async fn process_buy_after_payment(
        &self,
        market_id: &Value,
        buyer_id: &Value,
    ) -> Result<SettlementStatus, SettlementError>;
}

/// Stand-in used when the market database failed to open at startup.
pub struct UnavailableSettlement;

#[async_trait]
impl PaymentSettlement for UnavailableSettlement {
    async fn process_buy_after_payment(
        &self,
        _market_id: &Value,
        _buyer_id: &Value,
    ) -> Result<SettlementStatus, SettlementError> {
        Err(SettlementError::Unavailable)
    }
}
