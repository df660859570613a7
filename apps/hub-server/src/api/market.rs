// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    auth::CurrentUser,
    error::ApiError,
    models::{CreateListingRequest, ErrorBody, MarketListing},
    state::AppState,
    storage::MarketDatabase,
};

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize, IntoParams)]
pub struct MarketQuery {
    /// Active listings to skip
    pub offset: Option<usize>,
    /// Page size (default 20, max 100)
    pub limit: Option<usize>,
}

fn ledger(state: &AppState) -> Result<MarketDatabase, ApiError> {
    state
        .market
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Market unavailable"))
}

#[utoipa::path(
    get,
    path = "/market",
    params(MarketQuery),
    tag = "Market",
    responses(
        (status = 200, description = "Active listings", body = [MarketListing]),
        (status = 401, description = "Authentication failed", body = ErrorBody),
        (status = 503, description = "Market database unavailable", body = ErrorBody)
    )
)]
pub async fn list_listings(
    _user: CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<MarketQuery>,
) -> Result<Json<Vec<MarketListing>>, ApiError> {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

    let listings = ledger(&state)?
        .blocking(move |db| db.list_active(offset, limit))
        .await?;
    Ok(Json(listings.into_iter().map(MarketListing::from).collect()))
}

#[utoipa::path(
    post,
    path = "/market/listings",
    request_body = CreateListingRequest,
    tag = "Market",
    responses(
        (status = 201, description = "Listing created", body = MarketListing),
        (status = 400, description = "Invalid listing", body = ErrorBody),
        (status = 401, description = "Authentication failed", body = ErrorBody),
        (status = 503, description = "Market database unavailable", body = ErrorBody)
    )
)]
pub async fn create_listing(
    CurrentUser(seller_id): CurrentUser,
    State(state): State<AppState>,
    Json(request): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<MarketListing>), ApiError> {
    let item_id = request.item_id.trim().to_string();
    if item_id.is_empty() {
        return Err(ApiError::bad_request("item_id is required"));
    }
    if request.price_stars == 0 {
        return Err(ApiError::bad_request("price_stars must be positive"));
    }

    let price_stars = request.price_stars;
    let listing = ledger(&state)?
        .blocking(move |db| db.create_listing(seller_id, &item_id, price_stars))
        .await?;
    info!(
        market_id = listing.market_id,
        seller_id,
        price_stars,
        "Market listing created"
    );

    Ok((StatusCode::CREATED, Json(listing.into())))
}

#[utoipa::path(
    get,
    path = "/market/{market_id}",
    params(
        ("market_id" = u64, Path, description = "Listing identifier")
    ),
    tag = "Market",
    responses(
        (status = 200, description = "Listing", body = MarketListing),
        (status = 401, description = "Authentication failed", body = ErrorBody),
        (status = 404, description = "Listing not found", body = ErrorBody),
        (status = 503, description = "Market database unavailable", body = ErrorBody)
    )
)]
pub async fn get_listing(
    _user: CurrentUser,
    Path(market_id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<MarketListing>, ApiError> {
    ledger(&state)?
        .blocking(move |db| db.get_listing(market_id))
        .await?
        .map(|listing| Json(listing.into()))
        .ok_or_else(|| ApiError::not_found("Listing not found"))
}
