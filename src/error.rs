// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the sync pipeline.
//!
//! Every variant carries enough context for an operator to resume: the page
//! that failed and the cursor that was last committed.

use chrono::{DateTime, Utc};

use crate::time_utils::format_optional_utc;

/// Errors surfaced by the ingestion and reconciliation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No usable refresh token, or the token endpoint rejected it.
    /// Requires re-running `auth`.
    #[error("Authorization required: {0}")]
    Auth(String),

    /// Network failure while refreshing the access token (retryable).
    #[error("Token refresh failed transiently: {0}")]
    TransientAuth(String),

    /// Quota still exhausted after backoff. The cursor is the last committed value.
    #[error("Strava rate limit exceeded on page {page} (cursor {})", format_optional_utc(.cursor.clone()))]
    RateLimitExceeded {
        page: u32,
        cursor: Option<DateTime<Utc>>,
    },

    /// Unexpected API failure on a given page.
    #[error("Strava request failed on page {page}: {message}")]
    RemoteRequest {
        page: u32,
        status: Option<u16>,
        message: String,
    },

    /// Durable write failed; the batch was rolled back.
    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// Store could not be opened or read.
    #[error("Store error: {0}")]
    Store(String),
}

impl SyncError {
    /// Whether re-running the sync later may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::TransientAuth(_) | SyncError::RateLimitExceeded { .. } => true,
            SyncError::RemoteRequest { status, .. } => {
                status.map_or(true, |s| s == 429 || s >= 500)
            }
            SyncError::Auth(_) | SyncError::StoreWrite(_) | SyncError::Store(_) => false,
        }
    }

    /// Whether this error requires re-authorization.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::Auth(_))
    }

    /// Page number the error is attached to, if any.
    pub fn page(&self) -> Option<u32> {
        match self {
            SyncError::RateLimitExceeded { page, .. } | SyncError::RemoteRequest { page, .. } => {
                Some(*page)
            }
            _ => None,
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Store(err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
