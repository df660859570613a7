// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup and shared
//! read-only through [`crate::state::AppState`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `TELEGRAM_BOT_TOKEN` | Bot token (init-data key and Bot API auth) | Required |
//! | `JWT_SECRET` | HS256 secret for session tokens | Required |
//! | `JWT_ACCESS_MINUTES` | Access token lifetime in minutes | `15` |
//! | `JWT_REFRESH_DAYS` | Refresh token lifetime in days | `30` |
//! | `INIT_DATA_MAX_AGE_SECS` | Init-data freshness window (`0` disables) | `86400` |
//! | `APP_ENV` | `development` or `production` | `development` |
//! | `COOKIE_SECURE` | Override for the cookie `Secure` attribute | By `APP_ENV` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8000` |
//! | `DATABASE_PATH` | Market ledger file | `data/hub.redb` |
//! | `DB_FAIL_FAST` | Abort startup when the database cannot be opened | `false` |
//! | `CORS_ALLOWED_ORIGINS` | `*` or comma-separated origins | `*` |
//! | `RATE_LIMIT_PER_SECOND` | Per-IP replenish rate (`0` disables) | `10` |
//! | `RATE_LIMIT_BURST` | Per-IP burst size | `30` |
//! | `TELEGRAM_API_BASE_URL` | Bot API base URL | `https://api.telegram.org` |
//! | `TELEGRAM_WEBHOOK_URL` | Registered with `setWebhook` at startup | Optional |
//! | `TELEGRAM_WEBHOOK_SECRET` | Expected `X-Telegram-Bot-Api-Secret-Token` | Optional |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | Serve HTTPS with rustls | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{fmt, path::PathBuf, str::FromStr};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DATABASE_PATH: &str = "data/hub.redb";
pub const DEFAULT_TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_ACCESS_MINUTES: i64 = 15;
const DEFAULT_REFRESH_DAYS: i64 = 30;
const DEFAULT_INIT_DATA_MAX_AGE_SECS: u64 = 86_400;
const DEFAULT_RATE_LIMIT_PER_SECOND: u64 = 10;
const DEFAULT_RATE_LIMIT_BURST: u32 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Deployment environment. Controls the cookie `Secure` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    /// Any origin; with credentials the request origin is mirrored back.
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            CorsOrigins::Any
        } else {
            CorsOrigins::List(origins)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub per_second: u64,
    pub burst: u32,
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub jwt_secret: String,
    pub jwt_access_minutes: i64,
    pub jwt_refresh_days: i64,
    /// `None` disables the freshness check.
    pub init_data_max_age_secs: Option<u64>,
    pub app_env: AppEnv,
    pub cookie_secure: bool,
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub db_fail_fast: bool,
    pub cors_origins: CorsOrigins,
    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimit>,
    pub telegram_api_base_url: String,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub tls: Option<TlsPaths>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_env = env_parse("APP_ENV", AppEnv::Development)?;
        let cookie_secure = match env_optional("COOKIE_SECURE") {
            Some(raw) => parse_bool("COOKIE_SECURE", &raw)?,
            None => app_env == AppEnv::Production,
        };

        let jwt_access_minutes = env_parse("JWT_ACCESS_MINUTES", DEFAULT_ACCESS_MINUTES)?;
        let jwt_refresh_days = env_parse("JWT_REFRESH_DAYS", DEFAULT_REFRESH_DAYS)?;
        if jwt_access_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_ACCESS_MINUTES",
                reason: "must be positive".to_string(),
            });
        }
        if jwt_refresh_days <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_REFRESH_DAYS",
                reason: "must be positive".to_string(),
            });
        }

        let max_age: u64 = env_parse("INIT_DATA_MAX_AGE_SECS", DEFAULT_INIT_DATA_MAX_AGE_SECS)?;
        let per_second: u64 = env_parse("RATE_LIMIT_PER_SECOND", DEFAULT_RATE_LIMIT_PER_SECOND)?;
        let burst: u32 = env_parse("RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST)?;

        let tls = match (env_optional("TLS_CERT_PATH"), env_optional("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    name: "TLS_CERT_PATH",
                    reason: "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
                })
            }
        };

        Ok(Self {
            telegram_bot_token: env_required("TELEGRAM_BOT_TOKEN")?,
            jwt_secret: env_required("JWT_SECRET")?,
            jwt_access_minutes,
            jwt_refresh_days,
            init_data_max_age_secs: (max_age > 0).then_some(max_age),
            app_env,
            cookie_secure,
            host: env_or_default("HOST", DEFAULT_HOST),
            port: env_parse("PORT", DEFAULT_PORT)?,
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", DEFAULT_DATABASE_PATH)),
            db_fail_fast: match env_optional("DB_FAIL_FAST") {
                Some(raw) => parse_bool("DB_FAIL_FAST", &raw)?,
                None => false,
            },
            cors_origins: CorsOrigins::parse(&env_or_default("CORS_ALLOWED_ORIGINS", "*")),
            rate_limit: (per_second > 0 && burst > 0).then_some(RateLimit { per_second, burst }),
            telegram_api_base_url: env_or_default(
                "TELEGRAM_API_BASE_URL",
                DEFAULT_TELEGRAM_API_BASE_URL,
            ),
            webhook_url: env_optional("TELEGRAM_WEBHOOK_URL"),
            webhook_secret: env_optional("TELEGRAM_WEBHOOK_SECRET"),
            tls,
        })
    }

    /// Access token lifetime in seconds (also the cookie `Max-Age`).
    pub fn access_ttl_secs(&self) -> i64 {
        self.jwt_access_minutes * 60
    }

    /// Refresh token lifetime in seconds (also the cookie `Max-Age`).
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.jwt_refresh_days * 86_400
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_access_minutes", &self.jwt_access_minutes)
            .field("jwt_refresh_days", &self.jwt_refresh_days)
            .field("init_data_max_age_secs", &self.init_data_max_age_secs)
            .field("app_env", &self.app_env)
            .field("cookie_secure", &self.cookie_secure)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_path", &self.database_path)
            .field("db_fail_fast", &self.db_fail_fast)
            .field("cors_origins", &self.cors_origins)
            .field("rate_limit", &self.rate_limit)
            .field("telegram_api_base_url", &self.telegram_api_base_url)
            .field("webhook_url", &self.webhook_url)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .finish()
    }
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    env_optional(name).ok_or(ConfigError::Missing(name))
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env_optional(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}
