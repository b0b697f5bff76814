// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync orchestration: remote pages, then the sheet snapshot.
//!
//! Sources are processed one after another, never concurrently against the
//! store. Each remote page is committed before the next one is requested,
//! so an aborted run leaves the store at the last fully committed page.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::db::CanonicalStore;
use crate::error::SyncError;
use crate::models::Source;
use crate::services::fetcher::RemoteFetcher;
use crate::services::reconciler::Reconciler;
use crate::services::sheet_reader::SheetReader;
use crate::time_utils::format_optional_utc;

/// How far one source got.
#[derive(Debug)]
pub struct SourceSummary {
    pub source: Source,
    /// Records read from the source
    pub fetched: usize,
    /// Items or rows that could not be parsed
    pub skipped: usize,
    /// Records written to the store
    pub committed: usize,
    /// Pages (remote) or snapshots (sheet) committed
    pub batches: u32,
    /// Cursor after the last successful commit
    pub cursor: Option<DateTime<Utc>>,
    /// Error that stopped this source, if any
    pub error: Option<SyncError>,
}

impl SourceSummary {
    fn new(source: Source, cursor: Option<DateTime<Utc>>) -> Self {
        Self {
            source,
            fetched: 0,
            skipped: 0,
            committed: 0,
            batches: 0,
            cursor,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for SourceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: fetched {}, skipped {}, committed {}, cursor {}",
            self.source,
            self.fetched,
            self.skipped,
            self.committed,
            format_optional_utc(self.cursor)
        )?;
        if let Some(err) = &self.error {
            write!(f, ", stopped: {err}")?;
        }
        if self.source == Source::Remote && self.skipped > 0 {
            write!(f, " (skipped activities are behind the cursor; rerun with --full)")?;
        }
        Ok(())
    }
}

/// Per-source results of one run. Produced even on partial failure.
#[derive(Debug)]
pub struct SyncReport {
    pub remote: SourceSummary,
    pub sheet: SourceSummary,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.remote.is_success() && self.sheet.is_success()
    }

    /// First error in processing order.
    pub fn error(&self) -> Option<&SyncError> {
        self.remote.error.as_ref().or(self.sheet.error.as_ref())
    }
}

/// Wires fetcher, sheet reader and reconciler into one run.
pub struct SyncPipeline {
    fetcher: RemoteFetcher,
    sheet: SheetReader,
    reconciler: Reconciler,
    full_resync: bool,
}

impl SyncPipeline {
    pub fn new(fetcher: RemoteFetcher, sheet: SheetReader, store: CanonicalStore) -> Self {
        Self {
            fetcher,
            sheet,
            reconciler: Reconciler::new(store),
            full_resync: false,
        }
    }

    /// Fetch the whole remote history instead of the delta after the cursor.
    ///
    /// Records are upserted by key and the cursor never moves backwards, so a
    /// full resync only fills in what earlier runs missed.
    pub fn with_full_resync(mut self, full_resync: bool) -> Self {
        self.full_resync = full_resync;
        self
    }

    fn store(&self) -> &CanonicalStore {
        self.reconciler.store()
    }

    /// Sync the remote source, then the sheet.
    ///
    /// A store failure on the remote side skips the sheet; any other remote
    /// failure does not, since the sheet is independent of the API.
    pub async fn run(&self) -> SyncReport {
        let remote = self.sync_remote().await;

        let sheet = match &remote.error {
            Some(SyncError::StoreWrite(_) | SyncError::Store(_)) => {
                let mut skipped = SourceSummary::new(Source::Sheet, None);
                skipped.error = Some(SyncError::Store(
                    "Skipped after remote store failure".to_string(),
                ));
                skipped
            }
            _ => self.sync_sheet().await,
        };

        SyncReport { remote, sheet }
    }

    /// Fetch and commit remote pages from the stored cursor onward.
    pub async fn sync_remote(&self) -> SourceSummary {
        let start = match self.store().cursor(Source::Remote).await {
            Ok(cursor) => cursor.map(|c| c.last_synced),
            Err(e) => {
                let mut summary = SourceSummary::new(Source::Remote, None);
                summary.error = Some(e);
                return summary;
            }
        };

        let mut summary = SourceSummary::new(Source::Remote, start);
        let fetch_from = if self.full_resync { None } else { start };
        tracing::info!(
            cursor = %format_optional_utc(start),
            full_resync = self.full_resync,
            "Starting remote sync"
        );

        let mut pager = self.fetcher.fetch_since(fetch_from);
        loop {
            let page = match pager.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    summary.error = Some(with_committed_cursor(e, summary.cursor));
                    break;
                }
            };

            summary.fetched += page.activities.len();
            summary.skipped += page.skipped;

            match self.reconciler.commit_activities(page.activities).await {
                Ok(commit) => {
                    summary.committed += commit.total();
                    summary.batches += 1;
                    if let Some(cursor) = commit.cursor {
                        summary.cursor = Some(cursor.last_synced);
                    }
                }
                Err(e) => {
                    summary.error = Some(e);
                    break;
                }
            }
        }

        if summary.skipped > 0 {
            tracing::warn!(
                skipped = summary.skipped,
                "Unparseable activities are now behind the cursor; run a full resync to retry them"
            );
        }

        log_summary(&summary);
        summary
    }

    /// Read the sheet and commit it as one snapshot.
    pub async fn sync_sheet(&self) -> SourceSummary {
        let start = self
            .store()
            .cursor(Source::Sheet)
            .await
            .ok()
            .flatten()
            .map(|c| c.last_synced);
        let mut summary = SourceSummary::new(Source::Sheet, start);

        let report = self.sheet.read_all().await;
        summary.fetched = report.rows.len();
        summary.skipped = report.skipped.len();

        match self.reconciler.commit_sheet(&report.rows).await {
            Ok(commit) => {
                summary.committed = commit.total();
                if commit.total() > 0 {
                    summary.batches = 1;
                }
                summary.cursor = commit.cursor.map(|c| c.last_synced);
            }
            Err(e) => summary.error = Some(e),
        }

        log_summary(&summary);
        summary
    }
}

/// Attach the cursor committed so far to a rate-limit failure.
fn with_committed_cursor(err: SyncError, cursor: Option<DateTime<Utc>>) -> SyncError {
    match err {
        SyncError::RateLimitExceeded { page, .. } => SyncError::RateLimitExceeded { page, cursor },
        other => other,
    }
}

fn log_summary(summary: &SourceSummary) {
    match &summary.error {
        None => tracing::info!(
            source = %summary.source,
            fetched = summary.fetched,
            skipped = summary.skipped,
            committed = summary.committed,
            cursor = %format_optional_utc(summary.cursor),
            "Source sync complete"
        ),
        Some(err) => tracing::error!(
            source = %summary.source,
            fetched = summary.fetched,
            committed = summary.committed,
            page = ?err.page(),
            cursor = %format_optional_utc(summary.cursor),
            retryable = err.is_retryable(),
            error = %err,
            "Source sync stopped"
        ),
    }
}
