// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod clock;
pub mod export;
pub mod fetcher;
pub mod oauth_callback;
pub mod rate_limit;
pub mod reconciler;
pub mod retry;
pub mod sheet_reader;
pub mod strava;
pub mod summary;
pub mod sync;
pub mod token_manager;

pub use clock::{Clock, SystemClock};
pub use fetcher::{ActivityApi, ActivityPage, ActivityPager, FetchedPage, PageQuery, RemoteFetcher};
pub use oauth_callback::CallbackListener;
pub use rate_limit::RateLimitStatus;
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use retry::RetryPolicy;
pub use sheet_reader::SheetReader;
pub use strava::{ApiError, StravaClient, TokenResponse};
pub use summary::WorkoutSummary;
pub use sync::{SourceSummary, SyncPipeline, SyncReport};
pub use token_manager::{CredentialVault, TokenEndpoint, TokenManager};
