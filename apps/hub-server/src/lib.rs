// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! ChaosMeme Hub - Telegram Mini App Backend
//!
//! Authenticates Mini App users from Telegram-signed init-data, keeps them
//! signed in with JWT cookies, and settles Telegram Stars purchases
//! delivered through the bot webhook.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and router (Axum)
//! - `auth` - Init-data validation and session tokens
//! - `providers` - Telegram Bot API client
//! - `storage` - Market ledger: listings and payment settlement (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;
