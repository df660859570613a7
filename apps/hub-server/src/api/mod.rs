// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

use std::{sync::Arc, time::Duration};

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::{CorsOrigins, RateLimit},
    error::ApiError,
    models::{
        AuthResponse, CreateListingRequest, ErrorBody, HealthResponse, MarketListing, MeResponse,
        TestResponse, WebhookAck,
    },
    storage::ListingStatus,
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod market;
pub mod webhook;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let rate_limit = state.config.rate_limit;

    let mut client_routes = Router::new()
        .route("/auth/verify", post(auth::verify))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/me", get(auth::me))
        .route("/market", get(market::list_listings))
        .route("/market/listings", post(market::create_listing))
        .route("/market/{market_id}", get(market::get_listing))
        .route("/health", get(health::health))
        .route("/test", get(health::test));

    if let Some(limit) = rate_limit {
        client_routes = with_rate_limit(client_routes, limit);
    }

    // Telegram delivers from a small pool of IPs; the webhook is never
    // rate limited so payment updates are not dropped.
    let bot_routes = Router::new().route("/webhook", post(webhook::telegram_webhook));

    Router::new()
        .merge(client_routes)
        .merge(bot_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
}

/// Time for one token to replenish at `per_second` tokens per second.
fn replenish_period(per_second: u64) -> Duration {
    Duration::from_nanos(1_000_000_000 / per_second.max(1))
}

fn with_rate_limit(routes: Router<AppState>, limit: RateLimit) -> Router<AppState> {
    let config = GovernorConfigBuilder::default()
        .period(replenish_period(limit.per_second))
        .burst_size(limit.burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish();

    match config {
        Some(config) => routes.layer(GovernorLayer::new(Arc::new(config))),
        None => {
            warn!(
                per_second = limit.per_second,
                burst = limit.burst,
                "Invalid rate limit settings; rate limiting disabled"
            );
            routes
        }
    }
}

/// Wildcard origins are mirrored because browsers reject `*` together with
/// credentials.
fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    match origins {
        CorsOrigins::Any => layer.allow_origin(AllowOrigin::mirror_request()),
        CorsOrigins::List(list) => layer.allow_origin(AllowOrigin::list(
            list.iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )),
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not Found")
}

#[derive(OpenApi)]
#[openapi(
    info(title = "ChaosMeme Hub Backend"),
    paths(
        auth::verify,
        auth::refresh,
        auth::me,
        market::list_listings,
        market::create_listing,
        market::get_listing,
        webhook::telegram_webhook,
        health::health,
        health::test
    ),
    components(
        schemas(
            AuthResponse,
            MeResponse,
            CreateListingRequest,
            MarketListing,
            ListingStatus,
            ErrorBody,
            HealthResponse,
            TestResponse,
            WebhookAck
        )
    ),
    tags(
        (name = "Auth", description = "Telegram Mini App authentication"),
        (name = "Market", description = "Player-to-player listings paid in Stars"),
        (name = "Webhook", description = "Telegram bot updates and payments"),
        (name = "Health", description = "Liveness checks")
    )
)]
struct ApiDoc;
