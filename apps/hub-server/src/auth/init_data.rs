// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! Telegram Mini App init-data validation.
//!
//! Telegram signs the init-data query string with HMAC-SHA256:
//!
//! 1. `secret_key = HMAC_SHA256(key = "WebAppData", msg = bot_token)`
//! 2. `data_check_string` = every `key=value` pair except `hash`, sorted by
//!    key and joined with `\n` (values percent-decoded)
//! 3. `hash = hex(HMAC_SHA256(key = secret_key, msg = data_check_string))`
//!
//! See: https://core.telegram.org/bots/webapps#validating-data-received-via-the-mini-app

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

/// Tolerated clock difference for an `auth_date` ahead of the server.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct InitDataUser {
    id: i64,
}

/// Validates signed init-data against the bot token.
#[derive(Clone)]
pub struct InitDataValidator {
    secret_key: Vec<u8>,
    max_age_secs: Option<u64>,
}

impl InitDataValidator {
    pub fn new(bot_token: &str, max_age_secs: Option<u64>) -> Self {
        Self {
            secret_key: derive_secret_key(bot_token),
            max_age_secs,
        }
    }

    /// Validate init data and return the embedded Telegram user id.
    pub fn validate(&self, init_data: &str) -> Result<i64, AuthError> {
        self.validate_at(init_data, Utc::now())
    }

    /// Same as [`validate`](Self::validate) with an explicit clock.
    pub fn validate_at(&self, init_data: &str, now: DateTime<Utc>) -> Result<i64, AuthError> {
        if init_data.trim().is_empty() {
            return Err(AuthError::MissingInitData);
        }

        let mut fields = parse_fields(init_data)?;
        let received_hash = fields
            .remove("hash")
            .ok_or_else(|| AuthError::MalformedInitData("missing hash".to_string()))?;
        let received_hash =
            hex::decode(received_hash.trim()).map_err(|_| AuthError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret_key)
            .map_err(|e| AuthError::MalformedInitData(e.to_string()))?;
        mac.update(data_check_string(&fields).as_bytes());
        mac.verify_slice(&received_hash)
            .map_err(|_| AuthError::InvalidSignature)?;

        if let Some(max_age) = self.max_age_secs {
            let auth_date: i64 = fields
                .get("auth_date")
                .ok_or_else(|| AuthError::MalformedInitData("missing auth_date".to_string()))?
                .parse()
                .map_err(|_| AuthError::MalformedInitData("invalid auth_date".to_string()))?;
            let age_secs = now.timestamp() - auth_date;
            if age_secs < -MAX_CLOCK_SKEW_SECS {
                return Err(AuthError::InitDataFromFuture {
                    ahead_secs: -age_secs,
                });
            }
            if age_secs > max_age as i64 {
                return Err(AuthError::InitDataExpired { age_secs });
            }
        }

        let user_json = fields
            .get("user")
            .ok_or_else(|| AuthError::MalformedInitData("missing user".to_string()))?;
        let user: InitDataUser = serde_json::from_str(user_json)
            .map_err(|e| AuthError::MalformedInitData(format!("invalid user: {e}")))?;

        Ok(user.id)
    }
}

fn derive_secret_key(bot_token: &str) -> Vec<u8> {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(WEB_APP_DATA_KEY)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts any key length"));
    mac.update(bot_token.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn parse_fields(init_data: &str) -> Result<BTreeMap<String, String>, AuthError> {
    let mut fields = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(init_data.trim().as_bytes()) {
        if fields.insert(key.to_string(), value.into_owned()).is_some() {
            return Err(AuthError::MalformedInitData(format!(
                "duplicate field '{key}'"
            )));
        }
    }
    Ok(fields)
}

/// Fields are already sorted by the `BTreeMap`.
fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
