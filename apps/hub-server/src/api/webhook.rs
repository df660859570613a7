// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! # Telegram Webhook
//!
//! Receives bot updates and drives the payment flow:
//!
//! 1. `pre_checkout_query` → approve with `answerPreCheckoutQuery(ok = true)`
//!    before responding (Telegram rejects unanswered checkouts)
//! 2. `message.successful_payment` → decode the invoice payload and hand
//!    `(market_id, buyer_id)` to the settlement backend
//!
//! Every update is acknowledged with `200 {"ok": true}`. A non-200 makes
//! Telegram redeliver the update, which would replay the payment, so
//! failures are reported through logs only.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use tracing::{error, info, warn};

use crate::{
    models::{PaymentPayload, PreCheckoutQuery, SuccessfulPayment, TelegramUpdate, WebhookAck},
    providers::telegram::TelegramError,
    state::AppState,
    storage::{SettlementError, SettlementStatus},
};

/// Header Telegram sends when the webhook was registered with a secret.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("pre-checkout acknowledgment failed: {0}")]
    Acknowledge(#[from] TelegramError),

    #[error("update field is malformed: {0}")]
    MalformedUpdate(serde_json::Error),

    #[error("invoice payload is not valid JSON: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("settlement failed: {0}")]
    Settlement(#[from] SettlementError),
}

/// Result of the successful-payment step when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Settled(SettlementStatus),
    /// `successful_payment` without an `invoice_payload`
    NoPayload,
    /// Payload decoded but `market_id` or `buyer_id` is missing
    MissingIdentifiers,
}

/// Per-step outcomes of one update. `None` means the step did not apply.
#[derive(Debug, Default)]
pub struct WebhookReport {
    pub checkout: Option<Result<(), WebhookError>>,
    pub payment: Option<Result<PaymentOutcome, WebhookError>>,
}

#[utoipa::path(
    post,
    path = "/webhook",
    tag = "Webhook",
    request_body(content = Object, description = "Telegram Update object"),
    responses(
        (status = 200, description = "Update acknowledged", body = WebhookAck)
    )
)]
pub async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookAck> {
    if !secret_token_matches(state.config.webhook_secret.as_deref(), &headers) {
        warn!("Webhook secret token mismatch; update ignored");
        return ack();
    }

    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Webhook body is not a Telegram update; ignored");
            return ack();
        }
    };

    process_update(&state, &update).await;
    ack()
}

fn ack() -> Json<WebhookAck> {
    Json(WebhookAck { ok: true })
}

fn secret_token_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|received| received == expected)
}

/// Run every step that applies to `update`, logging each outcome.
///
/// Steps decode their own part of the update independently.
pub async fn process_update(state: &AppState, update: &TelegramUpdate) -> WebhookReport {
    let mut report = WebhookReport::default();
    let update_id = update.update_id.as_ref();

    if let Some(decoded) = update.pre_checkout_query() {
        let result = match decoded {
            Ok(query) => {
                let result = acknowledge_checkout(state, &query).await;
                match &result {
                    Ok(()) => info!(
                        update_id = ?update_id,
                        pre_checkout_query_id = %query.id,
                        "Pre-checkout query approved"
                    ),
                    Err(e) => error!(
                        update_id = ?update_id,
                        pre_checkout_query_id = %query.id,
                        error = %e,
                        "Pre-checkout query not acknowledged"
                    ),
                }
                result
            }
            Err(e) => {
                let err = WebhookError::MalformedUpdate(e);
                error!(update_id = ?update_id, error = %err, "Pre-checkout query is malformed");
                Err(err)
            }
        };
        report.checkout = Some(result);
    }

    if let Some(decoded) = update.successful_payment() {
        let result = match decoded {
            Ok(payment) => {
                let result = settle_payment(state, &payment).await;
                match &result {
                    Ok(outcome) => info!(
                        update_id = ?update_id,
                        charge_id = ?payment.telegram_payment_charge_id,
                        outcome = ?outcome,
                        "Successful payment processed"
                    ),
                    Err(e) => error!(
                        update_id = ?update_id,
                        charge_id = ?payment.telegram_payment_charge_id,
                        error = %e,
                        "Successful payment could not be settled"
                    ),
                }
                result
            }
            Err(e) => {
                let err = WebhookError::MalformedUpdate(e);
                error!(update_id = ?update_id, error = %err, "Successful payment is malformed");
                Err(err)
            }
        };
        report.payment = Some(result);
    }

    report
}

async fn acknowledge_checkout(
    state: &AppState,
    query: &PreCheckoutQuery,
) -> Result<(), WebhookError> {
    state
        .telegram
        .answer_pre_checkout_query(&query.id, true, None)
        .await?;
    Ok(())
}

fn parse_payload(raw: &str) -> Result<PaymentPayload, WebhookError> {
    Ok(serde_json::from_str(raw)?)
}

async fn settle_payment(
    state: &AppState,
    payment: &SuccessfulPayment,
) -> Result<PaymentOutcome, WebhookError> {
    let Some(raw) = payment.invoice_payload.as_deref().filter(|p| !p.is_empty()) else {
        return Ok(PaymentOutcome::NoPayload);
    };

    let payload = parse_payload(raw)?;
    let Some((market_id, buyer_id)) = payload.identifiers() else {
        warn!(payload = %raw, "Invoice payload lacks market_id or buyer_id");
        return Ok(PaymentOutcome::MissingIdentifiers);
    };

    let status = state
        .settlement
        .process_buy_after_payment(market_id, buyer_id)
        .await?;
    Ok(PaymentOutcome::Settled(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::test_support::{test_config, test_state_with, RecordingBot, RecordingSettlement};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn payment_update(payload: &str) -> Value {
        json!({
            "update_id": 10,
            "message": {
                "message_id": 3,
                "successful_payment": {
                    "currency": "XTR",
                    "total_amount": 100,
                    "invoice_payload": payload,
                    "telegram_payment_charge_id": "charge-1"
                }
            }
        })
    }

    async fn post_webhook(
        state: AppState,
        body: impl Into<Body>,
        secret: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request =
            Request::post("/webhook").header("content-type", "application/json");
        if let Some(secret) = secret {
            request = request.header(SECRET_TOKEN_HEADER, secret);
        }
        let response = router(state)
            .oneshot(request.body(body.into()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn pre_checkout_query_is_acknowledged_once() {
        let bot = Arc::new(RecordingBot::default());
        let settlement = Arc::new(RecordingSettlement::default());
        let state = test_state_with(test_config(), bot.clone(), settlement.clone());

        let body = json!({"pre_checkout_query": {"id": "abc"}}).to_string();
        let (status, ack) = post_webhook(state, body, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true}));
        assert_eq!(bot.answers(), vec![("abc".to_string(), true)]);
        assert!(settlement.calls().is_empty());
    }

    #[tokio::test]
    async fn pre_checkout_query_survives_malformed_sibling_fields() {
        let bot = Arc::new(RecordingBot::default());
        let state = test_state_with(
            test_config(),
            bot.clone(),
            Arc::new(RecordingSettlement::default()),
        );

        let body = json!({
            "update_id": "x",
            "message": {"successful_payment": {"invoice_payload": 5}},
            "pre_checkout_query": {"id": "abc"}
        })
        .to_string();
        let (status, ack) = post_webhook(state.clone(), body.clone(), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true}));
        assert_eq!(bot.answers(), vec![("abc".to_string(), true)]);

        let update: TelegramUpdate = serde_json::from_str(&body).unwrap();
        let report = process_update(&state, &update).await;
        assert!(matches!(report.checkout, Some(Ok(()))));
        assert!(matches!(
            report.payment,
            Some(Err(WebhookError::MalformedUpdate(_)))
        ));
    }

    #[tokio::test]
    async fn malformed_pre_checkout_query_still_settles_payment() {
        let bot = Arc::new(RecordingBot::default());
        let settlement = Arc::new(RecordingSettlement::default());
        let state = test_state_with(test_config(), bot.clone(), settlement.clone());

        let mut body = payment_update(r#"{"market_id": 7, "buyer_id": 42}"#);
        body["pre_checkout_query"] = json!({"id": 12});
        let (status, _) = post_webhook(state, body.to_string(), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(bot.answers().is_empty());
        assert_eq!(settlement.calls(), vec![(json!(7), json!(42))]);
    }

    #[tokio::test]
    async fn failed_acknowledgment_still_acks_webhook() {
        let bot = Arc::new(RecordingBot::failing());
        let state = test_state_with(
            test_config(),
            bot.clone(),
            Arc::new(RecordingSettlement::default()),
        );

        let update: TelegramUpdate =
            serde_json::from_value(json!({"pre_checkout_query": {"id": "abc"}})).unwrap();
        let report = process_update(&state, &update).await;
        assert!(matches!(
            report.checkout,
            Some(Err(WebhookError::Acknowledge(_)))
        ));
        assert!(report.payment.is_none());

        let body = json!({"pre_checkout_query": {"id": "abc"}}).to_string();
        let (status, ack) = post_webhook(state, body, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true}));
        assert_eq!(bot.answers().len(), 2);
    }

    #[tokio::test]
    async fn successful_payment_invokes_settlement_once() {
        let bot = Arc::new(RecordingBot::default());
        let settlement = Arc::new(RecordingSettlement::default());
        let state = test_state_with(test_config(), bot.clone(), settlement.clone());

        let body = payment_update(r#"{"market_id": 7, "buyer_id": 42}"#).to_string();
        let (status, ack) = post_webhook(state, body, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true}));
        assert_eq!(settlement.calls(), vec![(json!(7), json!(42))]);
        assert!(bot.answers().is_empty());
    }

    #[tokio::test]
    async fn settlement_failure_still_acks_webhook() {
        let settlement = Arc::new(RecordingSettlement::failing());
        let state = test_state_with(
            test_config(),
            Arc::new(RecordingBot::default()),
            settlement.clone(),
        );

        let update: TelegramUpdate =
            serde_json::from_value(payment_update(r#"{"market_id": 7, "buyer_id": 42}"#))
                .unwrap();
        let report = process_update(&state, &update).await;
        assert!(matches!(
            report.payment,
            Some(Err(WebhookError::Settlement(_)))
        ));

        let body = payment_update(r#"{"market_id": 7, "buyer_id": 42}"#).to_string();
        let (status, ack) = post_webhook(state, body, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true}));
        assert_eq!(settlement.calls().len(), 2);
    }

    #[tokio::test]
    async fn payload_without_market_id_skips_settlement() {
        let settlement = Arc::new(RecordingSettlement::default());
        let state = test_state_with(
            test_config(),
            Arc::new(RecordingBot::default()),
            settlement.clone(),
        );

        let update: TelegramUpdate =
            serde_json::from_value(payment_update(r#"{"buyer_id": 42}"#)).unwrap();
        let report = process_update(&state, &update).await;
        assert!(matches!(
            report.payment,
            Some(Ok(PaymentOutcome::MissingIdentifiers))
        ));

        let body = payment_update(r#"{"buyer_id": 42}"#).to_string();
        let (status, ack) = post_webhook(state, body, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true}));
        assert!(settlement.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_reported_and_acked() {
        let settlement = Arc::new(RecordingSettlement::default());
        let state = test_state_with(
            test_config(),
            Arc::new(RecordingBot::default()),
            settlement.clone(),
        );

        let update: TelegramUpdate =
            serde_json::from_value(payment_update("not json")).unwrap();
        let report = process_update(&state, &update).await;
        assert!(matches!(
            report.payment,
            Some(Err(WebhookError::MalformedPayload(_)))
        ));
        assert!(settlement.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_payload_is_ignored() {
        let state = test_state_with(
            test_config(),
            Arc::new(RecordingBot::default()),
            Arc::new(RecordingSettlement::default()),
        );
        let update: TelegramUpdate = serde_json::from_value(json!({
            "message": {"successful_payment": {"currency": "XTR", "total_amount": 1}}
        }))
        .unwrap();
        let report = process_update(&state, &update).await;
        assert!(matches!(report.payment, Some(Ok(PaymentOutcome::NoPayload))));
    }

    #[tokio::test]
    async fn non_json_body_is_acked() {
        let bot = Arc::new(RecordingBot::default());
        let state = test_state_with(
            test_config(),
            bot.clone(),
            Arc::new(RecordingSettlement::default()),
        );
        let (status, ack) = post_webhook(state, "{{{", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true}));
        assert!(bot.answers().is_empty());
    }

    #[tokio::test]
    async fn secret_mismatch_skips_processing_but_acks() {
        let mut config = test_config();
        config.webhook_secret = Some("s3cret".to_string());
        let bot = Arc::new(RecordingBot::default());
        let state = test_state_with(
            config,
            bot.clone(),
            Arc::new(RecordingSettlement::default()),
        );
        let body = json!({"pre_checkout_query": {"id": "abc"}}).to_string();

        let (status, ack) = post_webhook(state.clone(), body.clone(), Some("wrong")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true}));
        assert!(bot.answers().is_empty());

        let (status, _) = post_webhook(state, body, Some("s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bot.answers(), vec![("abc".to_string(), true)]);
    }

    #[test]
    fn secret_is_optional() {
        assert!(secret_token_matches(None, &HeaderMap::new()));
        assert!(!secret_token_matches(Some("x"), &HeaderMap::new()));
    }
}
