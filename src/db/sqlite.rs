// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite-backed canonical store with typed operations.
//!
//! Provides high-level operations for:
//! - Workouts (canonical records keyed by source and external ID)
//! - Sync cursors (per-source watermarks, committed with each batch)
//! - Credentials (the persisted OAuth token pair)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{FromRow, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::db::schema::SQLITE_INIT;
use crate::error::{Result, SyncError};
use crate::models::{CanonicalWorkout, OAuthToken, Source, StrengthSet, SyncCursor, WorkoutKey};
use crate::services::token_manager::CredentialVault;
use crate::time_utils::from_unix_seconds;

const WORKOUT_COLUMNS: &str = "source, external_id, category, name, start_time, duration_seconds, \
     distance_meters, elevation_gain_meters, route_polyline, strength_detail, raw_payload";

/// Durable canonical record set.
///
/// Cloning is cheap; clones share the pool and the single-writer lock.
#[derive(Clone)]
pub struct CanonicalStore {
    pool: SqlitePool,
    /// Serializes batch commits within this process.
    write_lock: Arc<Mutex<()>>,
}

/// Outcome of a committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCommit {
    pub inserted: usize,
    pub updated: usize,
    /// Cursor value stored after the commit
    pub cursor: Option<SyncCursor>,
}

impl BatchCommit {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

impl CanonicalStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::Store(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "Opened canonical store");
        Self::with_pool(pool).await
    }

    /// Create a private in-memory store (tests and dry runs).
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is a separate database, so pin to one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&pool).await?;
        }

        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    // ─── Workout Operations ──────────────────────────────────────

    /// Atomically upsert `records` and advance the cursor.
    ///
    /// Either every record and the cursor are committed, or nothing is. The
    /// stored cursor is `MAX(existing, new)` so it never moves backwards.
    pub(crate) async fn upsert_batch(
        &self,
        records: &[CanonicalWorkout],
        new_cursor: Option<SyncCursor>,
    ) -> Result<BatchCommit> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await.map_err(write_error)?;
        let mut commit = BatchCommit::default();
        let synced_at = Utc::now().timestamp();

        for record in records {
            if upsert_workout(&mut tx, record, synced_at).await? {
                commit.inserted += 1;
            } else {
                commit.updated += 1;
            }
        }

        if let Some(cursor) = new_cursor {
            commit.cursor = Some(advance_cursor(&mut tx, cursor).await?);
        }

        tx.commit().await.map_err(write_error)?;

        tracing::debug!(
            inserted = commit.inserted,
            updated = commit.updated,
            "Batch committed"
        );
        Ok(commit)
    }

    /// Every record, oldest first.
    pub async fn all_records(&self) -> Result<Vec<CanonicalWorkout>> {
        let rows = sqlx::query_as::<_, WorkoutRow>(&format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts ORDER BY start_time, source, external_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CanonicalWorkout::try_from).collect()
    }

    /// Records that started strictly after `since`, oldest first.
    pub async fn records_since(&self, since: DateTime<Utc>) -> Result<Vec<CanonicalWorkout>> {
        let rows = sqlx::query_as::<_, WorkoutRow>(&format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE start_time > ? \
             ORDER BY start_time, source, external_id"
        ))
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CanonicalWorkout::try_from).collect()
    }

    /// Look up a single record by identity key.
    pub async fn get(&self, key: &WorkoutKey) -> Result<Option<CanonicalWorkout>> {
        let row = sqlx::query_as::<_, WorkoutRow>(&format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE source = ? AND external_id = ?"
        ))
        .bind(key.source.as_str())
        .bind(&key.external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CanonicalWorkout::try_from).transpose()
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workouts")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    // ─── Cursor Operations ───────────────────────────────────────

    /// Current watermark for `source`, if it has ever been synced.
    pub async fn cursor(&self, source: Source) -> Result<Option<SyncCursor>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT last_synced FROM sync_cursors WHERE source = ?")
                .bind(source.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(secs,)| SyncCursor::new(source, from_unix_seconds(secs))))
    }
}

// ─── Credential Operations ───────────────────────────────────────

#[async_trait]
impl CredentialVault for CanonicalStore {
    async fn load_token(&self) -> Result<Option<OAuthToken>> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT access_token, refresh_token, expires_at FROM credentials WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(access_token, refresh_token, expires_at)| OAuthToken {
            access_token,
            refresh_token,
            expires_at: from_unix_seconds(expires_at),
        }))
    }

    async fn save_token(&self, token: &OAuthToken) -> Result<()> {
        if token.refresh_token.is_empty() {
            return Err(SyncError::StoreWrite(
                "Refusing to persist an empty refresh token".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO credentials (id, access_token, refresh_token, expires_at, updated_at)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at.timestamp())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }
}

/// Insert or replace one record. Returns `true` if the key was new.
async fn upsert_workout(
    tx: &mut Transaction<'_, Sqlite>,
    record: &CanonicalWorkout,
    synced_at: i64,
) -> Result<bool> {
    let exists: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM workouts WHERE source = ? AND external_id = ?")
            .bind(record.source.as_str())
            .bind(&record.external_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(write_error)?;

    let strength_detail = record
        .strength_detail
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| SyncError::StoreWrite(format!("Failed to encode strength detail: {e}")))?;
    let raw_payload = serde_json::to_string(&record.raw_payload)
        .map_err(|e| SyncError::StoreWrite(format!("Failed to encode payload: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO workouts (
            source, external_id, category, name, start_time, duration_seconds,
            distance_meters, elevation_gain_meters, route_polyline, strength_detail,
            raw_payload, synced_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source, external_id) DO UPDATE SET
            category = excluded.category,
            name = excluded.name,
            start_time = excluded.start_time,
            duration_seconds = excluded.duration_seconds,
            distance_meters = excluded.distance_meters,
            elevation_gain_meters = excluded.elevation_gain_meters,
            route_polyline = excluded.route_polyline,
            strength_detail = excluded.strength_detail,
            raw_payload = excluded.raw_payload,
            synced_at = excluded.synced_at
        "#,
    )
    .bind(record.source.as_str())
    .bind(&record.external_id)
    .bind(record.category.as_str())
    .bind(&record.name)
    .bind(record.start_time.timestamp())
    .bind(i64::try_from(record.duration_seconds).unwrap_or(i64::MAX))
    .bind(record.distance_meters)
    .bind(record.elevation_gain_meters)
    .bind(&record.route_polyline)
    .bind(strength_detail)
    .bind(raw_payload)
    .bind(synced_at)
    .execute(&mut **tx)
    .await
    .map_err(write_error)?;

    Ok(exists.is_none())
}

async fn advance_cursor(
    tx: &mut Transaction<'_, Sqlite>,
    cursor: SyncCursor,
) -> Result<SyncCursor> {
    let (stored,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO sync_cursors (source, last_synced) VALUES (?, ?)
        ON CONFLICT(source) DO UPDATE SET last_synced = MAX(last_synced, excluded.last_synced)
        RETURNING last_synced
        "#,
    )
    .bind(cursor.source.as_str())
    .bind(cursor.last_synced.timestamp())
    .fetch_one(&mut **tx)
    .await
    .map_err(write_error)?;

    Ok(SyncCursor::new(cursor.source, from_unix_seconds(stored)))
}

fn write_error(err: sqlx::Error) -> SyncError {
    SyncError::StoreWrite(err.to_string())
}

/// Row shape of the `workouts` table.
#[derive(Debug, FromRow)]
struct WorkoutRow {
    source: String,
    external_id: String,
    category: String,
    name: Option<String>,
    start_time: i64,
    duration_seconds: i64,
    distance_meters: Option<f64>,
    elevation_gain_meters: Option<f64>,
    route_polyline: Option<String>,
    strength_detail: Option<String>,
    raw_payload: String,
}

impl TryFrom<WorkoutRow> for CanonicalWorkout {
    type Error = SyncError;

    fn try_from(row: WorkoutRow) -> Result<Self> {
        let strength_detail = row
            .strength_detail
            .as_deref()
            .map(serde_json::from_str::<Vec<StrengthSet>>)
            .transpose()
            .map_err(|e| SyncError::Store(format!("Corrupt strength detail: {e}")))?;

        Ok(CanonicalWorkout {
            source: row.source.parse().map_err(SyncError::Store)?,
            external_id: row.external_id,
            category: row.category.parse().map_err(SyncError::Store)?,
            name: row.name,
            start_time: from_unix_seconds(row.start_time),
            duration_seconds: u64::try_from(row.duration_seconds).unwrap_or(0),
            distance_meters: row.distance_meters,
            elevation_gain_meters: row.elevation_gain_meters,
            route_polyline: row.route_polyline,
            strength_detail,
            raw_payload: serde_json::from_str(&row.raw_payload)
                .map_err(|e| SyncError::Store(format!("Corrupt payload: {e}")))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use serde_json::json;

    fn run(id: &str, start: i64) -> CanonicalWorkout {
        CanonicalWorkout {
            source: Source::Remote,
            external_id: id.to_string(),
            category: Category::Run,
            name: Some(format!("Run {id}")),
            start_time: from_unix_seconds(start),
            duration_seconds: 1800,
            distance_meters: Some(5000.0),
            elevation_gain_meters: Some(12.5),
            route_polyline: None,
            strength_detail: None,
            raw_payload: json!({ "id": id }),
        }
    }

    fn cursor(secs: i64) -> Option<SyncCursor> {
        Some(SyncCursor::new(Source::Remote, from_unix_seconds(secs)))
    }

    #[tokio::test]
    async fn test_upsert_batch_inserts_and_advances_cursor() {
        let store = CanonicalStore::open_in_memory().await.unwrap();

        let commit = store
            .upsert_batch(&[run("1", 100), run("2", 200)], cursor(200))
            .await
            .unwrap();

        assert_eq!(commit.inserted, 2);
        assert_eq!(commit.updated, 0);
        assert_eq!(store.count().await.unwrap(), 2);
        let stored = store.cursor(Source::Remote).await.unwrap().unwrap();
        assert_eq!(stored.last_synced.timestamp(), 200);
    }

    #[tokio::test]
    async fn test_same_key_replaces_record() {
        let store = CanonicalStore::open_in_memory().await.unwrap();
        store.upsert_batch(&[run("1", 100)], None).await.unwrap();

        let mut changed = run("1", 100);
        changed.category = Category::Walk;
        let commit = store.upsert_batch(&[changed], None).await.unwrap();

        assert_eq!(commit.updated, 1);
        assert_eq!(store.count().await.unwrap(), 1);
        let key = WorkoutKey {
            source: Source::Remote,
            external_id: "1".to_string(),
        };
        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.category, Category::Walk);
    }

    #[tokio::test]
    async fn test_cursor_never_moves_backwards() {
        let store = CanonicalStore::open_in_memory().await.unwrap();
        store.upsert_batch(&[run("1", 500)], cursor(500)).await.unwrap();

        let commit = store.upsert_batch(&[run("0", 100)], cursor(100)).await.unwrap();

        assert_eq!(commit.cursor.unwrap().last_synced.timestamp(), 500);
        let stored = store.cursor(Source::Remote).await.unwrap().unwrap();
        assert_eq!(stored.last_synced.timestamp(), 500);
    }

    #[tokio::test]
    async fn test_failed_batch_commits_nothing() {
        let store = CanonicalStore::open_in_memory().await.unwrap();
        store.upsert_batch(&[run("1", 100)], cursor(100)).await.unwrap();

        // Empty external IDs violate the table constraint mid-batch.
        let batch = [run("2", 200), run("", 300)];
        let err = store.upsert_batch(&batch, cursor(300)).await.unwrap_err();

        assert!(matches!(err, SyncError::StoreWrite(_)));
        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.cursor(Source::Remote).await.unwrap().unwrap();
        assert_eq!(stored.last_synced.timestamp(), 100);
    }

    #[tokio::test]
    async fn test_records_since_is_exclusive() {
        let store = CanonicalStore::open_in_memory().await.unwrap();
        store
            .upsert_batch(&[run("1", 100), run("2", 200), run("3", 300)], None)
            .await
            .unwrap();

        let since = store.records_since(from_unix_seconds(200)).await.unwrap();
        let ids: Vec<_> = since.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["3"]);
    }

    #[tokio::test]
    async fn test_strength_detail_round_trips() {
        let store = CanonicalStore::open_in_memory().await.unwrap();
        let lift = CanonicalWorkout {
            source: Source::Sheet,
            external_id: "lift-2024-01-05".to_string(),
            category: Category::Lift,
            name: Some("Lifting".to_string()),
            start_time: from_unix_seconds(1_704_412_800),
            duration_seconds: 0,
            distance_meters: None,
            elevation_gain_meters: None,
            route_polyline: None,
            strength_detail: Some(vec![StrengthSet {
                exercise: "squat".to_string(),
                sets: 5,
                reps: 5,
                weight: 225.0,
            }]),
            raw_payload: json!([{ "exercise": "squat" }]),
        };
        store.upsert_batch(&[lift.clone()], None).await.unwrap();

        assert_eq!(store.all_records().await.unwrap(), vec![lift]);
    }

    #[tokio::test]
    async fn test_vault_round_trip_and_rejects_empty_refresh() {
        let store = CanonicalStore::open_in_memory().await.unwrap();
        assert!(store.load_token().await.unwrap().is_none());

        let token = OAuthToken {
            access_token: "a1".to_string(),
            refresh_token: "r1".to_string(),
            expires_at: from_unix_seconds(1_800_000_000),
        };
        store.save_token(&token).await.unwrap();
        assert_eq!(store.load_token().await.unwrap(), Some(token.clone()));

        let empty = OAuthToken {
            refresh_token: String::new(),
            ..token.clone()
        };
        assert!(store.save_token(&empty).await.is_err());
        assert_eq!(store.load_token().await.unwrap(), Some(token));
    }
}
