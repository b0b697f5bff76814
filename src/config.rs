// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local use. The
//! client secret and refresh token are never printed, including via `Debug`.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use crate::error::ConfigError;

/// Default Strava API root.
pub const DEFAULT_API_BASE: &str = "https://www.strava.com/api/v3";
/// Default Strava token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://www.strava.com/oauth/token";
/// Default Strava authorize page.
pub const DEFAULT_AUTH_URL: &str = "https://www.strava.com/oauth/authorize";

/// Application configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    // --- Strava identity ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Seed refresh token; the vault's persisted token takes precedence
    pub strava_refresh_token: Option<String>,

    // --- Endpoints ---
    pub api_base: String,
    pub token_url: String,
    pub auth_url: String,

    // --- Local paths ---
    /// SQLite file backing the canonical store
    pub db_path: PathBuf,
    /// Tab-separated lifting export
    pub sheet_path: PathBuf,
    /// Target directory for export/visualize
    pub output_dir: PathBuf,

    // --- Sync tuning ---
    pub page_size: u32,
    pub token_refresh_margin: Duration,
    pub rate_limit_max_wait: Duration,
    pub http_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("strava_client_id", &self.strava_client_id)
            .field("strava_client_secret", &"[redacted]")
            .field(
                "strava_refresh_token",
                &self.strava_refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .field("api_base", &self.api_base)
            .field("token_url", &self.token_url)
            .field("db_path", &self.db_path)
            .field("sheet_path", &self.sheet_path)
            .field("output_dir", &self.output_dir)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_refresh_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            db_path: PathBuf::from("data/workouts.db"),
            sheet_path: PathBuf::from("data/workouts.tsv"),
            output_dir: PathBuf::from("output"),
            page_size: 100,
            token_refresh_margin: Duration::from_secs(60),
            rate_limit_max_wait: Duration::from_secs(15 * 60),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            strava_refresh_token: env::var("STRAVA_REFRESH_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            api_base: env::var("STRAVA_API_BASE").unwrap_or(defaults.api_base),
            token_url: env::var("STRAVA_TOKEN_URL").unwrap_or(defaults.token_url),
            auth_url: env::var("STRAVA_AUTH_URL").unwrap_or(defaults.auth_url),

            db_path: env::var("WORKOUT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            sheet_path: env::var("WORKOUT_SHEET_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.sheet_path),
            output_dir: env::var("WORKOUT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),

            page_size: parse_var("SYNC_PAGE_SIZE")?.unwrap_or(defaults.page_size),
            token_refresh_margin: parse_var("TOKEN_REFRESH_MARGIN_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.token_refresh_margin),
            rate_limit_max_wait: parse_var("RATE_LIMIT_MAX_WAIT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_max_wait),
            http_timeout: parse_var("HTTP_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
        })
    }
}

/// Parse an optional numeric variable, rejecting garbage instead of silently defaulting.
fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(None),
    }
}
