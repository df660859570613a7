// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! Authentication errors.

use axum::response::{IntoResponse, Response};

use crate::error::ApiError;

/// Body detail returned for every authentication failure.
pub const AUTH_FAILED_DETAIL: &str = "Authentication failed";

/// Authentication error type.
///
/// Every variant maps to the same generic 401 response. The variant itself
/// is only ever logged server-side.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// `X-Telegram-Init-Data` header absent or empty
    #[error("init data is missing")]
    MissingInitData,

    /// Init data could not be parsed or lacks required fields
    #[error("init data is malformed: {0}")]
    MalformedInitData(String),

    /// Init data hash does not match the recomputed signature
    #[error("init data signature is invalid")]
    InvalidSignature,

    /// Init data `auth_date` is older than the freshness window
    #[error("init data is too old ({age_secs} seconds)")]
    InitDataExpired { age_secs: i64 },

    /// Init data `auth_date` is ahead of the server clock beyond the skew
    #[error("init data is dated {ahead_secs} seconds in the future")]
    InitDataFromFuture { ahead_secs: i64 },

    /// No session cookie or bearer token on the request
    #[error("session token is missing")]
    MissingToken,

    /// Session token failed signature, structure, or type checks
    #[error("session token is invalid")]
    InvalidToken,

    /// Session token has expired
    #[error("session token has expired")]
    TokenExpired,

    /// Token could not be signed
    #[error("failed to issue session token: {0}")]
    TokenIssue(String),
}

impl AuthError {
    /// Stable code used as a structured log field.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingInitData => "missing_init_data",
            AuthError::MalformedInitData(_) => "malformed_init_data",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::InitDataExpired { .. } => "init_data_expired",
            AuthError::InitDataFromFuture { .. } => "init_data_from_future",
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenIssue(_) => "token_issue",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::warn!(
            error_code = self.error_code(),
            error = %self,
            "Authentication failed"
        );
        ApiError::unauthorized(AUTH_FAILED_DETAIL).into_response()
    }
}
