// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! Embedded market ledger backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `listings`: market_id → serialized StoredListing
//! - `purchases`: market_id → serialized StoredPurchase (one per sold listing)
//! - `meta`: counters (`next_market_id`)
//!
//! redb transactions block, so async callers go through
//! [`MarketDatabase::blocking`], which runs them on tokio's blocking pool.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::settlement::{PaymentSettlement, SettlementError, SettlementStatus};

// =============================================================================
// Table Definitions
// =============================================================================

const LISTINGS: TableDefinition<u64, &[u8]> = TableDefinition::new("listings");

const PURCHASES: TableDefinition<u64, &[u8]> = TableDefinition::new("purchases");

const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_MARKET_ID: &str = "next_market_id";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MarketDbError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task failed: {0}")]
    Task(String),
}

pub type MarketDbResult<T> = Result<T, MarketDbError>;

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredListing {
    pub market_id: u64,
    pub item_id: String,
    /// Telegram user id of the seller
    pub seller_id: i64,
    /// Price in Telegram Stars
    pub price_stars: u64,
    pub status: ListingStatus,
    #[serde(default)]
    pub buyer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sold_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPurchase {
    pub market_id: u64,
    pub item_id: String,
    pub buyer_id: String,
    pub seller_id: i64,
    pub price_stars: u64,
    pub settled_at: DateTime<Utc>,
}

// =============================================================================
// MarketDatabase
// =============================================================================

#[derive(Clone)]
pub struct MarketDatabase {
    db: Arc<Database>,
}

impl MarketDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> MarketDbResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(LISTINGS)?;
            let _ = write_txn.open_table(PURCHASES)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Run `f` against the database on the blocking thread pool.
    pub async fn blocking<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&MarketDatabase) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<MarketDbError> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| E::from(MarketDbError::Task(e.to_string())))?
    }

    /// Create an active listing under the next market id.
    pub fn create_listing(
        &self,
        seller_id: i64,
        item_id: &str,
        price_stars: u64,
    ) -> MarketDbResult<StoredListing> {
        let write_txn = self.db.begin_write()?;
        let listing = {
            let mut meta = write_txn.open_table(META)?;
            let market_id = meta.get(NEXT_MARKET_ID)?.map(|v| v.value()).unwrap_or(1);
            meta.insert(NEXT_MARKET_ID, market_id + 1)?;

            let listing = StoredListing {
                market_id,
                item_id: item_id.to_string(),
                seller_id,
                price_stars,
                status: ListingStatus::Active,
                buyer_id: None,
                created_at: Utc::now(),
                sold_at: None,
            };
            let json = serde_json::to_vec(&listing)?;
            let mut listings = write_txn.open_table(LISTINGS)?;
            listings.insert(market_id, json.as_slice())?;
            listing
        };
        write_txn.commit()?;
        Ok(listing)
    }

    pub fn get_listing(&self, market_id: u64) -> MarketDbResult<Option<StoredListing>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LISTINGS)?;
        match table.get(market_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Active listings in market id order.
    pub fn list_active(&self, offset: usize, limit: usize) -> MarketDbResult<Vec<StoredListing>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LISTINGS)?;

        let mut active = Vec::new();
        let mut skipped = 0;
        for entry in table.iter()? {
            if active.len() >= limit {
                break;
            }
            let (_, value) = entry?;
            let listing: StoredListing = serde_json::from_slice(value.value())?;
            if listing.status != ListingStatus::Active {
                continue;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            active.push(listing);
        }
        Ok(active)
    }

    #[cfg(test)]
    fn get_purchase(&self, market_id: u64) -> MarketDbResult<Option<StoredPurchase>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PURCHASES)?;
        match table.get(market_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Mark a listing sold to `buyer_id` and record the purchase.
    ///
    /// Replaying the same (listing, buyer) pair is a no-op so redelivered
    /// payment updates cannot double-settle.
    pub fn settle_purchase(
        &self,
        market_id: u64,
        buyer_id: &str,
    ) -> Result<SettlementStatus, SettlementError> {
        let write_txn = self.db.begin_write().map_err(MarketDbError::from)?;
        let status = {
            let mut listings = write_txn.open_table(LISTINGS).map_err(MarketDbError::from)?;

            // Read existing value and deserialize before mutating
            let existing_bytes = {
                let existing = listings
                    .get(market_id)
                    .map_err(MarketDbError::from)?
                    .ok_or_else(|| SettlementError::ListingNotFound(market_id.to_string()))?;
                existing.value().to_vec()
            };
            let mut listing: StoredListing =
                serde_json::from_slice(&existing_bytes).map_err(MarketDbError::from)?;

            match (listing.status, listing.buyer_id.as_deref()) {
                (ListingStatus::Sold, Some(existing)) if existing == buyer_id => {
                    SettlementStatus::AlreadySettled
                }
                (ListingStatus::Sold, _) => {
                    return Err(SettlementError::AlreadySold(market_id.to_string()));
                }
                (ListingStatus::Active, _) => {
                    let now = Utc::now();
                    listing.status = ListingStatus::Sold;
                    listing.buyer_id = Some(buyer_id.to_string());
                    listing.sold_at = Some(now);

                    let purchase = StoredPurchase {
                        market_id,
                        item_id: listing.item_id.clone(),
                        buyer_id: buyer_id.to_string(),
                        seller_id: listing.seller_id,
                        price_stars: listing.price_stars,
                        settled_at: now,
                    };

                    let listing_json = serde_json::to_vec(&listing).map_err(MarketDbError::from)?;
                    let purchase_json =
                        serde_json::to_vec(&purchase).map_err(MarketDbError::from)?;
                    listings
                        .insert(market_id, listing_json.as_slice())
                        .map_err(MarketDbError::from)?;

                    let mut purchases =
                        write_txn.open_table(PURCHASES).map_err(MarketDbError::from)?;
                    purchases
                        .insert(market_id, purchase_json.as_slice())
                        .map_err(MarketDbError::from)?;
                    SettlementStatus::Settled
                }
            }
        };
        write_txn.commit().map_err(MarketDbError::from)?;
        Ok(status)
    }
}

/// Market ids are numeric; they may arrive as a JSON number or string.
fn market_id_from(value: &Value) -> Result<u64, SettlementError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| SettlementError::InvalidIdentifier {
        field: "market_id",
        value: value.to_string(),
    })
}

fn buyer_id_from(value: &Value) -> Result<String, SettlementError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(SettlementError::InvalidIdentifier {
            field: "buyer_id",
            value: other.to_string(),
        }),
    }
}

#[async_trait]
impl PaymentSettlement for MarketDatabase {
    async fn process_buy_after_payment(
        &self,
        market_id: &Value,
        buyer_id: &Value,
    ) -> Result<SettlementStatus, SettlementError> {
        let market_id = market_id_from(market_id)?;
        let buyer_id = buyer_id_from(buyer_id)?;
        self.blocking(move |db| db.settle_purchase(market_id, &buyer_id))
            .await
    }
}
