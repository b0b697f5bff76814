// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQL DDL for the canonical store.
//!
//! Timestamps are stored as Unix seconds so range queries compare integers.

/// Tables:
/// - `workouts`: canonical records keyed by `(source, external_id)`
/// - `sync_cursors`: one watermark per source
/// - `credentials`: the single persisted OAuth token pair
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS workouts (
    source TEXT NOT NULL,
    external_id TEXT NOT NULL CHECK (external_id <> ''),
    category TEXT NOT NULL,
    name TEXT NULL,
    start_time INTEGER NOT NULL,
    duration_seconds INTEGER NOT NULL,
    distance_meters REAL NULL,
    elevation_gain_meters REAL NULL,
    route_polyline TEXT NULL,
    strength_detail TEXT NULL, -- JSON array
    raw_payload TEXT NOT NULL, -- JSON
    synced_at INTEGER NOT NULL,
    PRIMARY KEY (source, external_id)
);

CREATE INDEX IF NOT EXISTS idx_workouts_start_time ON workouts(start_time);

CREATE TABLE IF NOT EXISTS sync_cursors (
    source TEXT PRIMARY KEY NOT NULL,
    last_synced INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    id INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL CHECK (refresh_token <> ''),
    expires_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;
