// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

use std::sync::Arc;

use crate::{
    auth::{InitDataValidator, TokenIssuer},
    config::Config,
    providers::telegram::BotApi,
    storage::{MarketDatabase, PaymentSettlement},
};

/// Application context handed to every handler.
///
/// Built once in `main` after configuration and the market database are
/// initialised; dropped on shutdown. Nothing in here is mutated per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub init_data: InitDataValidator,
    pub tokens: TokenIssuer,
    pub telegram: Arc<dyn BotApi>,
    pub settlement: Arc<dyn PaymentSettlement>,
    /// `None` when the database failed to open and startup soft-failed.
    pub market: Option<MarketDatabase>,
}

impl AppState {
    pub fn new(
        config: Config,
        telegram: Arc<dyn BotApi>,
        settlement: Arc<dyn PaymentSettlement>,
    ) -> Self {
        Self {
            init_data: InitDataValidator::new(
                &config.telegram_bot_token,
                config.init_data_max_age_secs,
            ),
            tokens: TokenIssuer::from_config(&config),
            config: Arc::new(config),
            telegram,
            settlement,
            market: None,
        }
    }

    pub fn with_market(mut self, market: MarketDatabase) -> Self {
        self.market = Some(market);
        self
    }
}
