// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! Shared fixtures for unit tests.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use crate::{
    config::{AppEnv, Config, CorsOrigins, DEFAULT_TELEGRAM_API_BASE_URL},
    providers::telegram::{BotApi, TelegramError},
    state::AppState,
    storage::{
        settlement_backend, MarketDatabase, PaymentSettlement, SettlementError, SettlementStatus,
    },
};

pub const TEST_BOT_TOKEN: &str = "123456:TEST-bot-token";

pub fn test_config() -> Config {
    Config {
        telegram_bot_token: TEST_BOT_TOKEN.to_string(),
        jwt_secret: "test-jwt-secret-with-enough-entropy".to_string(),
        jwt_access_minutes: 15,
        jwt_refresh_days: 30,
        init_data_max_age_secs: Some(86_400),
        app_env: AppEnv::Development,
        cookie_secure: false,
        host: "127.0.0.1".to_string(),
        port: 8000,
        database_path: PathBuf::from("data/test-hub.redb"),
        db_fail_fast: false,
        cors_origins: CorsOrigins::Any,
        rate_limit: None,
        telegram_api_base_url: DEFAULT_TELEGRAM_API_BASE_URL.to_string(),
        webhook_url: None,
        webhook_secret: None,
        tls: None,
    }
}

/// Records `answerPreCheckoutQuery` calls instead of sending them.
#[derive(Default)]
pub struct RecordingBot {
    answers: Mutex<Vec<(String, bool)>>,
    fail: bool,
}

impl RecordingBot {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn answers(&self) -> Vec<(String, bool)> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl BotApi for RecordingBot {
    async fn answer_pre_checkout_query(
        &self,
        pre_checkout_query_id: &str,
        ok: bool,
        _error_message: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.answers
            .lock()
            .unwrap()
            .push((pre_checkout_query_id.to_string(), ok));
        if self.fail {
            return Err(TelegramError::Request("connection refused".to_string()));
        }
        Ok(())
    }

    async fn set_webhook(
        &self,
        _url: &str,
        _secret_token: Option<&str>,
    ) -> Result<(), TelegramError> {
        Ok(())
    }
}

/// Records settlement calls; optionally fails every one of them.
#[derive(Default)]
pub struct RecordingSettlement {
    calls: Mutex<Vec<(Value, Value)>>,
    fail: bool,
}

impl RecordingSettlement {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(Value, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentSettlement for RecordingSettlement {
    async fn process_buy_after_payment(
        &self,
        market_id: &Value,
        buyer_id: &Value,
    ) -> Result<SettlementStatus, SettlementError> {
        self.calls
            .lock()
            .unwrap()
            .push((market_id.clone(), buyer_id.clone()));
        if self.fail {
            return Err(SettlementError::Unavailable);
        }
        Ok(SettlementStatus::Settled)
    }
}

pub fn test_state() -> AppState {
    test_state_with_config(test_config())
}

pub fn test_state_with_config(config: Config) -> AppState {
    test_state_with(
        config,
        Arc::new(RecordingBot::default()),
        Arc::new(RecordingSettlement::default()),
    )
}

pub fn test_state_with(
    config: Config,
    telegram: Arc<dyn BotApi>,
    settlement: Arc<dyn PaymentSettlement>,
) -> AppState {
    AppState::new(config, telegram, settlement)
}

/// State backed by a real ledger in a temporary directory.
pub fn test_state_with_market() -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let market = MarketDatabase::open(&dir.path().join("hub.redb")).unwrap();
    let state = test_state_with(
        test_config(),
        Arc::new(RecordingBot::default()),
        settlement_backend(Some(&market)),
    )
    .with_market(market);
    (dir, state)
}
