// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote activity fetcher: paginated, rate-limited delta sync.
//!
//! Pages are requested strictly one at a time. Each request re-asks the
//! token manager for a token, waits out an exhausted quota observed on the
//! previous response, and retries 429/5xx/network failures under the
//! shared retry policy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::models::RawActivity;
use crate::services::clock::Clock;
use crate::services::rate_limit::RateLimitStatus;
use crate::services::retry::RetryPolicy;
use crate::services::strava::ApiError;
use crate::services::token_manager::TokenManager;

/// Strava's documented maximum for `per_page`.
pub const MAX_PAGE_SIZE: u32 = 200;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Parameters of one list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// Unix seconds; only activities starting after this are returned
    pub after: i64,
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
}

/// One page of the list endpoint plus the quota state it reported.
#[derive(Debug, Clone, Default)]
pub struct ActivityPage {
    pub items: Vec<Value>,
    pub rate_limit: RateLimitStatus,
}

/// Paginated activity listing.
#[async_trait]
pub trait ActivityApi: Send + Sync {
    async fn list_activities(
        &self,
        access_token: &str,
        query: &PageQuery,
    ) -> std::result::Result<ActivityPage, ApiError>;
}

/// A page of parsed activities handed to the reconciler.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub page: u32,
    pub activities: Vec<RawActivity>,
    /// Items in the response that could not be parsed
    pub skipped: usize,
}

impl FetchedPage {
    /// Latest start time on this page.
    pub fn max_start(&self) -> Option<DateTime<Utc>> {
        self.activities.iter().map(|a| a.start_timestamp).max()
    }
}

/// Builds pagers over the remote activity list.
#[derive(Clone)]
pub struct RemoteFetcher {
    api: Arc<dyn ActivityApi>,
    tokens: Arc<TokenManager>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    page_size: u32,
    max_rate_limit_wait: Duration,
}

impl RemoteFetcher {
    pub fn new(
        api: Arc<dyn ActivityApi>,
        tokens: Arc<TokenManager>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            tokens,
            clock,
            retry,
            page_size: DEFAULT_PAGE_SIZE,
            max_rate_limit_wait: Duration::from_secs(900),
        }
    }

    /// Set the page size, clamped to what the API accepts.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Upper bound on a single wait for an exhausted quota window.
    pub fn with_max_rate_limit_wait(mut self, max_wait: Duration) -> Self {
        self.max_rate_limit_wait = max_wait;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Lazily fetch every activity that started after `cursor`.
    ///
    /// Nothing is requested until the first `next_page` call.
    pub fn fetch_since(&self, cursor: Option<DateTime<Utc>>) -> ActivityPager {
        let after = cursor.map_or(0, |c| c.timestamp());
        self.resume(after, 1, cursor)
    }

    /// Continue a pager from a captured `(after, page)` resume point.
    pub fn resume(&self, after: i64, page: u32, cursor: Option<DateTime<Utc>>) -> ActivityPager {
        ActivityPager {
            fetcher: self.clone(),
            after,
            next_page: page.max(1),
            progress: cursor,
            rate_limit: RateLimitStatus::default(),
            done: false,
        }
    }
}

/// Restartable, on-demand sequence of activity pages.
pub struct ActivityPager {
    fetcher: RemoteFetcher,
    after: i64,
    next_page: u32,
    /// Latest start time handed out so far (or the starting cursor)
    progress: Option<DateTime<Utc>>,
    /// Quota state from the most recent response
    rate_limit: RateLimitStatus,
    done: bool,
}

impl ActivityPager {
    /// Where a new pager should pick up if this one is abandoned.
    pub fn resume_point(&self) -> (i64, u32) {
        (self.after, self.next_page)
    }

    /// Start time watermark covering every page returned so far.
    pub fn progress(&self) -> Option<DateTime<Utc>> {
        self.progress
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch the next page, or `None` once the delta is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<FetchedPage>> {
        if self.done {
            return Ok(None);
        }

        let query = PageQuery {
            after: self.after,
            page: self.next_page,
            per_page: self.fetcher.page_size,
        };

        self.wait_for_quota().await;
        let response = self.request_page(&query).await?;
        self.rate_limit = response.rate_limit;

        let item_count = response.items.len();
        if item_count < query.per_page as usize {
            self.done = true;
        }
        if item_count == 0 {
            tracing::debug!(page = query.page, "Empty page, sync complete");
            return Ok(None);
        }

        let mut activities = Vec::with_capacity(item_count);
        let mut skipped = 0;
        for item in response.items {
            match RawActivity::from_api_value(item) {
                Ok(activity) => activities.push(activity),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        page = query.page,
                        error = %e,
                        "Skipping unparseable activity; delta sync will not re-fetch it, \
                         a full resync (`fetch --full`) is needed once it parses"
                    );
                }
            }
        }

        // Every item predates the cursor: the server ignored `after`.
        let delta_exhausted = !activities.is_empty()
            && activities
                .iter()
                .all(|a| a.start_timestamp.timestamp() <= self.after);
        if delta_exhausted {
            tracing::debug!(page = query.page, "Page older than cursor, sync complete");
            self.done = true;
            return Ok(None);
        }

        let page = FetchedPage {
            page: query.page,
            activities,
            skipped,
        };

        if let Some(max_start) = page.max_start() {
            self.progress = Some(self.progress.map_or(max_start, |p| p.max(max_start)));
        }
        self.next_page += 1;

        tracing::debug!(
            page = page.page,
            activities = page.activities.len(),
            skipped = page.skipped,
            done = self.done,
            "Fetched activity page"
        );

        Ok(Some(page))
    }

    /// Adapt into a `Stream` of activities, fetching pages as it is polled.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<RawActivity>> {
        async_stream::try_stream! {
            while let Some(page) = self.next_page().await? {
                for activity in page.activities {
                    yield activity;
                }
            }
        }
    }

    /// Suspend until the reset time if the last response exhausted the quota.
    async fn wait_for_quota(&mut self) {
        let now = self.fetcher.clock.now();
        if let Some(wait) = self
            .rate_limit
            .wait_needed(now, self.fetcher.max_rate_limit_wait)
        {
            tracing::info!(
                wait_secs = wait.as_secs(),
                reset_at = ?self.rate_limit.reset_at,
                "Rate limit exhausted, waiting for reset"
            );
            self.fetcher.clock.sleep(wait).await;
            self.rate_limit = RateLimitStatus::default();
        }
    }

    /// One page with auth recovery and bounded backoff.
    async fn request_page(&self, query: &PageQuery) -> Result<ActivityPage> {
        let fetcher = &self.fetcher;
        let mut attempts = 0;
        let mut reauthorized = false;

        loop {
            let token = fetcher.tokens.get_valid_token().await?;
            attempts += 1;

            let err = match fetcher.api.list_activities(&token, query).await {
                Ok(page) => return Ok(page),
                Err(e) => e,
            };

            if err.is_unauthorized() {
                if reauthorized {
                    return Err(SyncError::Auth(format!(
                        "Access token rejected after refresh on page {}",
                        query.page
                    )));
                }
                tracing::warn!(page = query.page, "Access token rejected, refreshing once");
                fetcher.tokens.invalidate().await;
                reauthorized = true;
                attempts -= 1;
                continue;
            }

            if !(err.is_rate_limited() || err.is_transient()) {
                return Err(self.request_error(query.page, err));
            }

            if !fetcher.retry.allows_retry(attempts) {
                tracing::warn!(page = query.page, attempts, error = %err, "Giving up on page");
                return Err(if err.is_rate_limited() {
                    SyncError::RateLimitExceeded {
                        page: query.page,
                        cursor: self.progress,
                    }
                } else {
                    self.request_error(query.page, err)
                });
            }

            let mut delay = fetcher.retry.delay_for_retry(attempts);
            if let ApiError::Status { rate_limit, .. } = &err {
                if let Some(wait) =
                    rate_limit.wait_needed(fetcher.clock.now(), fetcher.max_rate_limit_wait)
                {
                    delay = delay.max(wait);
                }
            }

            tracing::warn!(
                page = query.page,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Page request failed, backing off"
            );
            fetcher.clock.sleep(delay).await;
        }
    }

    fn request_error(&self, page: u32, err: ApiError) -> SyncError {
        SyncError::RemoteRequest {
            page,
            status: err.status(),
            message: err.to_string(),
        }
    }
}
