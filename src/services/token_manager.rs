// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token lifecycle: cached access token, refresh, and persistence.
//!
//! The manager owns the only in-memory copy of the token pair. Callers get
//! it by construction; there is no process-wide credential state.

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Result, SyncError};
use crate::models::OAuthToken;
use crate::services::clock::Clock;
use crate::services::retry::RetryPolicy;
use crate::services::strava::{ApiError, TokenResponse};
use crate::time_utils::from_unix_seconds;

/// Remote token endpoint (authorization-code and refresh-token grants).
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange_code(&self, code: &str) -> std::result::Result<TokenResponse, ApiError>;

    async fn refresh(&self, refresh_token: &str) -> std::result::Result<TokenResponse, ApiError>;
}

/// Durable home of the token pair across runs.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    async fn load_token(&self) -> Result<Option<OAuthToken>>;

    async fn save_token(&self, token: &OAuthToken) -> Result<()>;
}

/// Hands out valid access tokens, refreshing through the endpoint when needed.
pub struct TokenManager {
    endpoint: Arc<dyn TokenEndpoint>,
    vault: Arc<dyn CredentialVault>,
    clock: Arc<dyn Clock>,
    margin: Duration,
    retry: RetryPolicy,
    /// Current pair. Held across the refresh round trip so concurrent
    /// callers wait instead of refreshing twice.
    cached: Mutex<Option<OAuthToken>>,
}

impl TokenManager {
    pub fn new(
        endpoint: Arc<dyn TokenEndpoint>,
        vault: Arc<dyn CredentialVault>,
        clock: Arc<dyn Clock>,
        margin: std::time::Duration,
        retry: RetryPolicy,
        initial: Option<OAuthToken>,
    ) -> Self {
        Self {
            endpoint,
            vault,
            clock,
            margin: Duration::from_std(margin).unwrap_or_else(|_| Duration::seconds(60)),
            retry,
            cached: Mutex::new(initial),
        }
    }

    /// Build a manager from the vault, falling back to a seed refresh token.
    ///
    /// A persisted pair wins over the seed because refresh tokens rotate.
    pub async fn load(
        endpoint: Arc<dyn TokenEndpoint>,
        vault: Arc<dyn CredentialVault>,
        clock: Arc<dyn Clock>,
        margin: std::time::Duration,
        retry: RetryPolicy,
        seed_refresh_token: Option<String>,
    ) -> Result<Self> {
        let initial = match vault.load_token().await? {
            Some(token) => {
                tracing::debug!(expires_at = %token.expires_at, "Loaded token pair from vault");
                Some(token)
            }
            None => seed_refresh_token
                .filter(|t| !t.is_empty())
                .map(OAuthToken::from_refresh_token),
        };

        Ok(Self::new(endpoint, vault, clock, margin, retry, initial))
    }

    /// Get a valid (non-expiring) access token.
    ///
    /// Fast path: a cached token valid beyond the safety margin is returned
    /// with no I/O. Otherwise the refresh token is exchanged; the new pair is
    /// persisted first and only then replaces the cache. On any failure the
    /// cached pair is left untouched.
    pub async fn get_valid_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(self.clock.now(), self.margin) {
                return Ok(token.access_token.clone());
            }
        }

        let refresh_token = match cached.as_ref() {
            Some(token) if !token.refresh_token.is_empty() => token.refresh_token.clone(),
            _ => {
                return Err(SyncError::Auth(
                    "No refresh token available; run `auth` first".to_string(),
                ))
            }
        };

        tracing::info!("Access token expired, refreshing");

        let response = self
            .retry
            .run(
                self.clock.as_ref(),
                || self.endpoint.refresh(&refresh_token),
                ApiError::is_transient,
            )
            .await
            .map_err(classify_refresh_error)?;

        let token = token_from_response(response, Some(&refresh_token))?;
        self.vault.save_token(&token).await?;

        let access_token = token.access_token.clone();
        *cached = Some(token);

        tracing::info!("Token refreshed and persisted");
        Ok(access_token)
    }

    /// Drop the cached access token so the next call refreshes.
    ///
    /// The refresh token is kept.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_mut() {
            token.access_token.clear();
        }
    }

    /// One-time bootstrap: exchange an authorization code for the first pair.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<OAuthToken> {
        let code = code.trim();
        if code.is_empty() {
            return Err(SyncError::Auth("Authorization code is empty".to_string()));
        }

        let response = self
            .retry
            .run(
                self.clock.as_ref(),
                || self.endpoint.exchange_code(code),
                ApiError::is_transient,
            )
            .await
            .map_err(classify_refresh_error)?;

        let token = token_from_response(response, None)?;

        let mut cached = self.cached.lock().await;
        self.vault.save_token(&token).await?;
        *cached = Some(token.clone());

        tracing::info!(expires_at = %token.expires_at, "Authorization code exchanged, tokens stored");
        Ok(token)
    }

    /// Snapshot of the cached pair.
    pub async fn current_token(&self) -> Option<OAuthToken> {
        self.cached.lock().await.clone()
    }
}

/// Rejections need re-authorization; everything else can be retried later.
fn classify_refresh_error(err: ApiError) -> SyncError {
    match err.status() {
        Some(400 | 401 | 403) => {
            tracing::warn!(error = %err, "Token endpoint rejected credentials");
            SyncError::Auth(format!("Token endpoint rejected credentials: {err}"))
        }
        _ => SyncError::TransientAuth(err.to_string()),
    }
}

/// Build the new pair, keeping the previous refresh token if none was returned.
fn token_from_response(response: TokenResponse, previous_refresh: Option<&str>) -> Result<OAuthToken> {
    if response.access_token.is_empty() {
        return Err(SyncError::TransientAuth(
            "Token endpoint returned an empty access token".to_string(),
        ));
    }

    let refresh_token = response
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| previous_refresh.map(str::to_string))
        .ok_or_else(|| SyncError::Auth("Token endpoint returned no refresh token".to_string()))?;

    Ok(OAuthToken {
        access_token: response.access_token,
        refresh_token,
        expires_at: from_unix_seconds(response.expires_at),
    })
}
