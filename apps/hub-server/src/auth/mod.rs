// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! # Authentication Module
//!
//! Telegram Mini App authentication for the hub API.
//!
//! ## Auth Flow
//!
//! 1. The Mini App sends `X-Telegram-Init-Data: <Telegram.WebApp.initData>`
//!    to `POST /auth/verify`
//! 2. The server:
//!    - Recomputes the init-data HMAC with a key derived from the bot token
//!    - Rejects stale payloads (`auth_date` older than the freshness window,
//!      or more than a minute in the future)
//!    - Extracts the Telegram `user.id`
//! 3. An access/refresh JWT pair is issued and set as `HttpOnly` cookies
//! 4. Feature routes read the access cookie through [`CurrentUser`]
//!
//! ## Security
//!
//! - Every failure is reported to the client as a generic 401
//! - Signature comparison is constant-time
//! - Tokens are stateless; there is no server-side revocation list

pub mod error;
pub mod extractor;
pub mod init_data;
pub mod tokens;

pub use error::AuthError;
pub use extractor::CurrentUser;
pub use init_data::InitDataValidator;
pub use tokens::{Claims, TokenIssuer, TokenKind, TokenPair};

/// Header carrying `Telegram.WebApp.initData`.
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
