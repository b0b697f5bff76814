// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Raw Strava activity as returned by the list endpoint.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Activity payload from the remote API, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawActivity {
    /// Strava activity ID
    pub external_id: String,
    /// Activity name/title
    pub name: Option<String>,
    /// Sport type (Ride, Run, Hike, etc.)
    pub activity_type: String,
    pub start_timestamp: DateTime<Utc>,
    pub duration_seconds: u64,
    pub distance_meters: Option<f64>,
    pub elevation_gain: Option<f64>,
    /// Encoded summary polyline (precision 5)
    pub route_polyline: Option<String>,
    /// Full JSON object as received
    pub raw_payload: Value,
}

/// Summary activity for list endpoints.
#[derive(Debug, Deserialize)]
struct StravaActivitySummary {
    id: u64,
    name: Option<String>,
    sport_type: Option<String>,
    #[serde(rename = "type")]
    legacy_type: Option<String>,
    start_date: DateTime<Utc>,
    elapsed_time: Option<u64>,
    moving_time: Option<u64>,
    distance: Option<f64>,
    total_elevation_gain: Option<f64>,
    map: Option<StravaMap>,
}

/// Activity map data with polylines.
#[derive(Debug, Deserialize)]
struct StravaMap {
    summary_polyline: Option<String>,
}

impl RawActivity {
    /// Parse one element of the list response, keeping the full object as payload.
    pub fn from_api_value(value: Value) -> Result<Self, serde_json::Error> {
        let summary = StravaActivitySummary::deserialize(&value)?;

        let activity_type = summary
            .sport_type
            .or(summary.legacy_type)
            .unwrap_or_else(|| "Other".to_string());

        let route_polyline = summary
            .map
            .and_then(|m| m.summary_polyline)
            .filter(|p| !p.is_empty());

        Ok(Self {
            external_id: summary.id.to_string(),
            name: summary.name,
            activity_type,
            start_timestamp: summary.start_date,
            duration_seconds: summary.elapsed_time.or(summary.moving_time).unwrap_or(0),
            distance_meters: summary.distance,
            elevation_gain: summary.total_elevation_gain,
            route_polyline,
            raw_payload: value,
        })
    }
}
