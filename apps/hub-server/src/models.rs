// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! # API Data Models
//!
//! Request and response bodies for the HTTP API, plus the subset of the
//! Telegram `Update` object the webhook understands. Response types derive
//! `ToSchema` for the OpenAPI document.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::storage::{ListingStatus, StoredListing};

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub detail: String,
}

/// Returned by `/auth/verify` and `/auth/refresh`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    /// `authenticated` or `refreshed`
    pub status: String,
    /// Telegram user id
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TestResponse {
    pub message: String,
}

/// Unconditional webhook acknowledgment.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub ok: bool,
}

// =============================================================================
// Market
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateListingRequest {
    pub item_id: String,
    /// Price in Telegram Stars
    pub price_stars: u64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MarketListing {
    /// Identifier embedded in invoice payloads
    pub market_id: u64,
    pub item_id: String,
    /// Telegram user id of the seller
    pub seller_id: i64,
    pub price_stars: u64,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
}

impl From<StoredListing> for MarketListing {
    fn from(listing: StoredListing) -> Self {
        Self {
            market_id: listing.market_id,
            item_id: listing.item_id,
            seller_id: listing.seller_id,
            price_stars: listing.price_stars,
            status: listing.status,
            created_at: listing.created_at,
        }
    }
}

// =============================================================================
// Telegram updates
// =============================================================================

/// A Telegram `Update`, kept as raw JSON at the top level.
///
/// Each webhook step decodes only the part it needs, so a malformed field
/// in one part of the update cannot stop another step from running.
#[derive(Debug, Default, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub update_id: Option<Value>,
    #[serde(default)]
    pub pre_checkout_query: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl TelegramUpdate {
    pub fn pre_checkout_query(&self) -> Option<Result<PreCheckoutQuery, serde_json::Error>> {
        self.pre_checkout_query.as_ref().map(decode)
    }

    /// `message.successful_payment`, if the message carries one.
    pub fn successful_payment(&self) -> Option<Result<SuccessfulPayment, serde_json::Error>> {
        self.message
            .as_ref()?
            .get("successful_payment")
            .filter(|v| !v.is_null())
            .map(decode)
    }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, serde_json::Error> {
    T::deserialize(value)
}

#[derive(Debug, Deserialize)]
pub struct PreCheckoutQuery {
    pub id: String,
    #[serde(default)]
    pub invoice_payload: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuccessfulPayment {
    #[serde(default)]
    pub invoice_payload: Option<String>,
    #[serde(default)]
    pub telegram_payment_charge_id: Option<String>,
}

/// Invoice payload attached when the invoice was created.
///
/// Both identifiers are opaque and handed to settlement unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct PaymentPayload {
    #[serde(default)]
    pub market_id: Option<Value>,
    #[serde(default)]
    pub buyer_id: Option<Value>,
}

impl PaymentPayload {
    /// Both identifiers, if present and non-empty (not null, false, 0 or "").
    pub fn identifiers(&self) -> Option<(&Value, &Value)> {
        match (&self.market_id, &self.buyer_id) {
            (Some(market_id), Some(buyer_id)) if is_truthy(market_id) && is_truthy(buyer_id) => {
                Some((market_id, buyer_id))
            }
            _ => None,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
