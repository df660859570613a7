// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

use axum::Json;

use crate::models::{HealthResponse, TestResponse};

/// Liveness probe.
///
/// Does not check the market database; a soft-failed store still reports
/// healthy so the auth endpoints stay reachable.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/test",
    tag = "Health",
    responses(
        (status = 200, description = "Server is running", body = TestResponse)
    )
)]
pub async fn test() -> Json<TestResponse> {
    Json(TestResponse {
        message: "Server is running normally".to_string(),
    })
}
