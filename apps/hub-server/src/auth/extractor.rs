// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! Axum extractor for the signed-in Telegram user.
//!
//! Feature routers take `CurrentUser` to require a session:
//!
//! ```rust,ignore
//! async fn inventory(CurrentUser(user_id): CurrentUser) -> impl IntoResponse {
//!     // user_id is the Telegram user id
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;

use super::{AuthError, TokenKind, ACCESS_COOKIE};
use crate::state::AppState;

/// Telegram user id of an authenticated request.
///
/// The access token is read from the `access_token` cookie first, then from
/// an `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i64);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = access_token_from_parts(parts).ok_or(AuthError::MissingToken)?;
        let claims = state.tokens.verify(&token, TokenKind::Access)?;
        Ok(CurrentUser(claims.user_id))
    }
}

fn access_token_from_parts(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        return Some(cookie.value().to_string());
    }

    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
