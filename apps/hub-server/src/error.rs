// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use tracing::error;

use crate::{models::ErrorBody, storage::MarketDbError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, detail)
    }
}

/// Storage failures are logged and surface as a bare 500.
impl From<MarketDbError> for ApiError {
    fn from(err: MarketDbError) -> Self {
        error!(error = %err, "Market database operation failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            detail: self.detail,
        });
        (self.status, body).into_response()
    }
}
