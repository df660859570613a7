// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! Telegram Bot API client for the payment flow.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::config::Config;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Request(String),

    #[error("Telegram rejected {method}: {description}")]
    Rejected {
        method: &'static str,
        description: String,
    },

    #[error("Telegram response was invalid: {0}")]
    InvalidResponse(String),
}

/// Outbound Bot API calls used by the server.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Approve or decline a pending purchase. Telegram auto-rejects the
    /// payment if this is not answered within its timeout.
    async fn answer_pre_checkout_query(
        &self,
        pre_checkout_query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> Result<(), TelegramError>;

    /// Register the webhook URL with Telegram.
    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<(), TelegramError>;
}

#[derive(Debug, Serialize)]
struct AnswerPreCheckoutQuery<'a> {
    pre_checkout_query_id: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
}

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    api_base_url: String,
    bot_token: String,
    http: Client,
}

impl TelegramClient {
    pub fn new(
        api_base_url: impl Into<String>,
        bot_token: impl Into<String>,
    ) -> Result<Self, TelegramError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TelegramError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: api_base_url.into(),
            bot_token: bot_token.into(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TelegramError> {
        Self::new(
            config.telegram_api_base_url.clone(),
            config.telegram_bot_token.clone(),
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }

    async fn call<T: Serialize + ?Sized>(
        &self,
        method: &'static str,
        body: &T,
    ) -> Result<(), TelegramError> {
        // The URL embeds the bot token, so reqwest errors are stripped of it.
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| TelegramError::Request(format!("{method} failed: {}", e.without_url())))?;

        let status = response.status();
        let envelope: BotApiResponse = response.json().await.map_err(|e| {
            TelegramError::InvalidResponse(format!(
                "{method} returned {status} with invalid JSON: {}",
                e.without_url()
            ))
        })?;

        if !envelope.ok {
            return Err(TelegramError::Rejected {
                method,
                description: envelope
                    .description
                    .unwrap_or_else(|| format!("HTTP {status}")),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn answer_pre_checkout_query(
        &self,
        pre_checkout_query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.call(
            "answerPreCheckoutQuery",
            &AnswerPreCheckoutQuery {
                pre_checkout_query_id,
                ok,
                error_message,
            },
        )
        .await?;

        info!(
            pre_checkout_query_id = %pre_checkout_query_id,
            ok,
            "Answered pre-checkout query"
        );
        Ok(())
    }

    async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&str>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({ "url": url });
        if let Some(secret) = secret_token {
            body["secret_token"] = Value::String(secret.to_string());
        }
        self.call("setWebhook", &body).await?;

        info!(url = %url, "Telegram webhook registered");
        Ok(())
    }
}
