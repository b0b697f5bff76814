// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scripted fakes for the network and time seams.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use workout_sync::db::CanonicalStore;
use workout_sync::error::{Result, SyncError};
use workout_sync::models::OAuthToken;
use workout_sync::services::{
    ActivityApi, ActivityPage, ApiError, Clock, CredentialVault, PageQuery, RateLimitStatus,
    RemoteFetcher, RetryPolicy, TokenEndpoint, TokenManager, TokenResponse,
};

/// 2024-06-01T00:00:00Z
pub const T0: i64 = 1_717_200_000;

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Clock whose `sleep` advances time instantly and records the duration.
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += ChronoDuration::from_std(by).unwrap();
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

/// Token endpoint that replays queued responses and counts calls.
#[derive(Default)]
pub struct ScriptedTokenEndpoint {
    responses: Mutex<VecDeque<std::result::Result<TokenResponse, ApiError>>>,
    calls: AtomicUsize,
    refresh_tokens_seen: Mutex<Vec<String>>,
}

impl ScriptedTokenEndpoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: std::result::Result<TokenResponse, ApiError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn push_token(&self, access: &str, refresh: &str, expires_at: i64) {
        self.push(Ok(TokenResponse {
            access_token: access.to_string(),
            refresh_token: Some(refresh.to_string()),
            expires_at,
        }));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refresh_tokens_seen.lock().unwrap().clone()
    }

    fn next(&self) -> std::result::Result<TokenResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("no scripted token response".to_string())))
    }
}

#[async_trait]
impl TokenEndpoint for ScriptedTokenEndpoint {
    async fn exchange_code(&self, _code: &str) -> std::result::Result<TokenResponse, ApiError> {
        self.next()
    }

    async fn refresh(&self, refresh_token: &str) -> std::result::Result<TokenResponse, ApiError> {
        self.refresh_tokens_seen
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.next()
    }
}

/// In-memory credential vault with an injectable write failure.
#[derive(Default)]
pub struct MemoryVault {
    token: Mutex<Option<OAuthToken>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryVault {
    pub fn new(token: Option<OAuthToken>) -> Arc<Self> {
        Arc::new(Self {
            token: Mutex::new(token),
            ..Self::default()
        })
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<OAuthToken> {
        self.token.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialVault for MemoryVault {
    async fn load_token(&self) -> Result<Option<OAuthToken>> {
        Ok(self.stored())
    }

    async fn save_token(&self, token: &OAuthToken) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SyncError::StoreWrite("disk full".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(())
    }
}

/// Activity API that replays queued pages and records every request.
#[derive(Default)]
pub struct ScriptedApi {
    responses: Mutex<VecDeque<std::result::Result<ActivityPage, ApiError>>>,
    queries: Mutex<Vec<PageQuery>>,
    tokens: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: std::result::Result<ActivityPage, ApiError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn push_page(&self, items: Vec<Value>) {
        self.push(Ok(page(items)));
    }

    pub fn push_status(&self, status: u16) {
        self.push(Err(status_error(status, RateLimitStatus::default())));
    }

    pub fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl ActivityApi for ScriptedApi {
    async fn list_activities(
        &self,
        access_token: &str,
        query: &PageQuery,
    ) -> std::result::Result<ActivityPage, ApiError> {
        self.queries.lock().unwrap().push(*query);
        self.tokens.lock().unwrap().push(access_token.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ActivityPage::default()))
    }
}

pub fn page(items: Vec<Value>) -> ActivityPage {
    ActivityPage {
        items,
        rate_limit: RateLimitStatus::default(),
    }
}

pub fn status_error(status: u16, rate_limit: RateLimitStatus) -> ApiError {
    ApiError::Status {
        status,
        body: format!("{{\"message\":\"status {status}\"}}"),
        rate_limit,
    }
}

/// Strava summary activity JSON.
pub fn activity_json(id: u64, start: i64, sport_type: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Activity {id}"),
        "sport_type": sport_type,
        "type": sport_type,
        "start_date": ts(start).to_rfc3339(),
        "elapsed_time": 1800,
        "moving_time": 1700,
        "distance": 5000.0,
        "total_elevation_gain": 40.0,
        "map": { "summary_polyline": "_p~iF~ps|U_ulLnnqC" }
    })
}

/// `count` activities with consecutive ids, one hour apart.
pub fn activities(first_id: u64, count: usize, first_start: i64) -> Vec<Value> {
    (0..count)
        .map(|i| activity_json(first_id + i as u64, first_start + 3600 * i as i64, "Run"))
        .collect()
}

/// Retry policy with no jitter and a one-second base.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(8),
        jitter: 0.0,
    }
}

pub fn fresh_token(clock: &FakeClock) -> OAuthToken {
    OAuthToken {
        access_token: "access-1".to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_at: clock.now() + ChronoDuration::hours(6),
    }
}

/// Fake network, in-memory vault and a token manager holding `initial`.
pub struct Harness {
    pub clock: Arc<FakeClock>,
    pub endpoint: Arc<ScriptedTokenEndpoint>,
    pub vault: Arc<MemoryVault>,
    pub api: Arc<ScriptedApi>,
    pub tokens: Arc<TokenManager>,
}

impl Harness {
    pub fn new(initial: Option<OAuthToken>, retry: RetryPolicy) -> Self {
        let clock = FakeClock::new(ts(T0));
        Self::with_clock(clock, initial, retry)
    }

    /// Harness holding a token valid for six hours.
    pub fn fresh(retry: RetryPolicy) -> Self {
        let clock = FakeClock::new(ts(T0));
        let token = fresh_token(&clock);
        Self::with_clock(clock, Some(token), retry)
    }

    fn with_clock(clock: Arc<FakeClock>, initial: Option<OAuthToken>, retry: RetryPolicy) -> Self {
        let endpoint = ScriptedTokenEndpoint::new();
        let vault = MemoryVault::new(initial.clone());
        let tokens = Arc::new(TokenManager::new(
            endpoint.clone(),
            vault.clone(),
            clock.clone(),
            Duration::from_secs(60),
            retry,
            initial,
        ));

        Self {
            clock,
            endpoint,
            vault,
            api: ScriptedApi::new(),
            tokens,
        }
    }

    pub fn fetcher(&self, page_size: u32, retry: RetryPolicy) -> RemoteFetcher {
        RemoteFetcher::new(
            self.api.clone(),
            self.tokens.clone(),
            self.clock.clone(),
            retry,
        )
        .with_page_size(page_size)
    }
}

pub async fn memory_store() -> CanonicalStore {
    CanonicalStore::open_in_memory().await.unwrap()
}
