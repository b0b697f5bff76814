// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for tokens and activity listings.
//!
//! Handles:
//! - Authorization-code and refresh-token grants
//! - Paginated activity listing with the `after` filter
//! - Rate-limit header capture on every response
//!
//! Retry and backoff decisions live in the callers; this client makes one
//! request per call and classifies the outcome.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::services::fetcher::{ActivityApi, ActivityPage, PageQuery};
use crate::services::rate_limit::RateLimitStatus;
use crate::services::token_manager::TokenEndpoint;

/// Scopes requested during the one-time authorization.
pub const OAUTH_SCOPES: &str = "read,activity:read_all";

/// Failure of a single Strava request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        rate_limit: RateLimitStatus,
    },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Network trouble or a server-side error; worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Decode(_) => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Token response from Strava (both grants).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Strava rotates refresh tokens; treat a missing value as "unchanged".
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp
    pub expires_at: i64,
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    auth_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client from configuration.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            auth_url: config.auth_url.clone(),
            client_id: config.strava_client_id.clone(),
            client_secret: config.strava_client_secret.clone(),
        })
    }

    /// Browser URL for the one-time authorization step.
    pub fn authorize_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&approval_prompt=force&scope={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(OAUTH_SCOPES),
        )
    }

    /// POST a form to the token endpoint.
    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ApiError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("Token request failed: {e}")))?;

        let response = check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("Failed to parse token response: {e}")))
    }
}

#[async_trait]
impl TokenEndpoint for StravaClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, ApiError> {
        self.token_request(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ApiError> {
        self.token_request(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }
}

#[async_trait]
impl ActivityApi for StravaClient {
    /// List activities (paginated, ascending when `after` is set).
    async fn list_activities(
        &self,
        access_token: &str,
        query: &PageQuery,
    ) -> Result<ActivityPage, ApiError> {
        let url = format!("{}/athlete/activities", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", query.after.to_string()),
                ("page", query.page.to_string()),
                ("per_page", query.per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = check_response(response).await?;
        let rate_limit = RateLimitStatus::from_headers(response.headers(), Utc::now());

        let items: Vec<Value> = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("JSON parse error: {e}")))?;

        Ok(ActivityPage { items, rate_limit })
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let rate_limit = RateLimitStatus::from_headers(response.headers(), Utc::now());
    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 429 {
        tracing::warn!(
            remaining = ?rate_limit.remaining,
            reset_at = ?rate_limit.reset_at,
            "Strava rate limit hit (429)"
        );
    }

    Err(ApiError::Status {
        status: status.as_u16(),
        body,
        rate_limit,
    })
}
