// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalization and merge of raw records into the canonical store.
//!
//! The reconciler is the only writer of the store. Each call commits one
//! batch (a fetched page or a sheet snapshot) atomically together with the
//! source's new cursor.

use chrono::NaiveDate;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

use crate::db::{BatchCommit, CanonicalStore};
use crate::error::Result;
use crate::models::{
    CanonicalWorkout, Category, RawActivity, RawSheetRow, Source, StrengthSet, SyncCursor,
    WorkoutKey,
};
use crate::time_utils::start_of_day_utc;

/// Title given to sheet-derived sessions.
pub const LIFT_SESSION_NAME: &str = "Lifting";

/// Commits from one `reconcile` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub remote: BatchCommit,
    pub sheet: BatchCommit,
}

/// Map a remote activity to its canonical form.
pub fn normalize_activity(activity: RawActivity) -> CanonicalWorkout {
    CanonicalWorkout {
        source: Source::Remote,
        category: Category::from_activity_type(&activity.activity_type),
        external_id: activity.external_id,
        name: activity.name,
        start_time: activity.start_timestamp,
        duration_seconds: activity.duration_seconds,
        distance_meters: activity.distance_meters,
        elevation_gain_meters: activity.elevation_gain,
        route_polyline: activity.route_polyline,
        strength_detail: None,
        raw_payload: activity.raw_payload,
    }
}

/// Stable identity of the lifting session on `date`.
pub fn sheet_external_id(date: NaiveDate) -> String {
    format!("lift-{}", date.format("%Y-%m-%d"))
}

/// Group sheet rows by date into one lift record per day, oldest first.
///
/// Exercises keep their file order within a day.
pub fn normalize_sheet(rows: &[RawSheetRow]) -> Vec<CanonicalWorkout> {
    let mut by_date: BTreeMap<NaiveDate, Vec<StrengthSet>> = BTreeMap::new();
    for row in rows {
        by_date.entry(row.date).or_default().push(StrengthSet {
            exercise: row.exercise.clone(),
            sets: row.sets,
            reps: row.reps,
            weight: row.weight,
        });
    }

    by_date
        .into_iter()
        .map(|(date, sets)| CanonicalWorkout {
            source: Source::Sheet,
            external_id: sheet_external_id(date),
            category: Category::Lift,
            name: Some(LIFT_SESSION_NAME.to_string()),
            start_time: start_of_day_utc(date),
            duration_seconds: 0,
            distance_meters: None,
            elevation_gain_meters: None,
            route_polyline: None,
            raw_payload: json!({
                "date": date.format("%Y-%m-%d").to_string(),
                "exercises": &sets,
            }),
            strength_detail: Some(sets),
        })
        .collect()
}

/// Collapse records sharing an identity key; the last occurrence wins.
pub fn dedupe(records: Vec<CanonicalWorkout>) -> Vec<CanonicalWorkout> {
    let mut positions: HashMap<WorkoutKey, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<CanonicalWorkout> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&record.key()) {
            Some(&idx) => unique[idx] = record,
            None => {
                positions.insert(record.key(), unique.len());
                unique.push(record);
            }
        }
    }

    unique
}

/// Writes normalized batches into the canonical store.
#[derive(Clone)]
pub struct Reconciler {
    store: CanonicalStore,
}

impl Reconciler {
    pub fn new(store: CanonicalStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CanonicalStore {
        &self.store
    }

    /// Commit one page of remote activities and advance the remote cursor.
    pub async fn commit_activities(&self, activities: Vec<RawActivity>) -> Result<BatchCommit> {
        let records = dedupe(activities.into_iter().map(normalize_activity).collect());
        self.commit(Source::Remote, records).await
    }

    /// Commit a full sheet snapshot and advance the sheet cursor.
    pub async fn commit_sheet(&self, rows: &[RawSheetRow]) -> Result<BatchCommit> {
        self.commit(Source::Sheet, normalize_sheet(rows)).await
    }

    /// Merge both sources: the remote batch first, then the sheet snapshot.
    pub async fn reconcile(
        &self,
        raw_activities: Vec<RawActivity>,
        raw_sheet_rows: &[RawSheetRow],
    ) -> Result<ReconcileOutcome> {
        let remote = self.commit_activities(raw_activities).await?;
        let sheet = self.commit_sheet(raw_sheet_rows).await?;
        Ok(ReconcileOutcome { remote, sheet })
    }

    async fn commit(&self, source: Source, records: Vec<CanonicalWorkout>) -> Result<BatchCommit> {
        let Some(max_start) = records.iter().map(|r| r.start_time).max() else {
            // Nothing new: leave the store and cursor alone.
            return Ok(BatchCommit {
                cursor: self.store.cursor(source).await?,
                ..BatchCommit::default()
            });
        };

        let commit = self
            .store
            .upsert_batch(&records, Some(SyncCursor::new(source, max_start)))
            .await?;

        tracing::info!(
            source = %source,
            inserted = commit.inserted,
            updated = commit.updated,
            cursor = ?commit.cursor.map(|c| c.last_synced),
            "Reconciled batch"
        );
        Ok(commit)
    }
}
