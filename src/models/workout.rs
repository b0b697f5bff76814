// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Canonical workout record shared by every downstream consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Where a canonical record came from. Part of the identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Remote,
    Sheet,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Remote, Source::Sheet];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Remote => "remote",
            Source::Sheet => "sheet",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(Source::Remote),
            "sheet" => Ok(Source::Sheet),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// Normalized workout category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Run,
    Walk,
    Ride,
    Lift,
    /// Catch-all for activity types we do not recognize.
    Other,
}

impl Category {
    /// Map a Strava `sport_type` to a category. Unknown types land in `Other`.
    pub fn from_activity_type(activity_type: &str) -> Self {
        match activity_type {
            "Run" | "TrailRun" | "VirtualRun" => Category::Run,
            "Walk" | "Hike" => Category::Walk,
            "Ride" | "VirtualRide" | "EBikeRide" | "GravelRide" | "MountainBikeRide"
            | "EMountainBikeRide" => Category::Ride,
            "WeightTraining" => Category::Lift,
            _ => Category::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Run => "run",
            Category::Walk => "walk",
            Category::Ride => "ride",
            Category::Lift => "lift",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run" => Ok(Category::Run),
            "walk" => Ok(Category::Walk),
            "ride" => Ok(Category::Ride),
            "lift" => Ok(Category::Lift),
            "other" => Ok(Category::Other),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// One exercise line of a lifting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthSet {
    pub exercise: String,
    pub sets: u32,
    pub reps: u32,
    /// Weight in pounds; 0 for bodyweight work
    pub weight: f64,
}

impl StrengthSet {
    /// Total load moved: sets × reps × weight.
    pub fn volume(&self) -> f64 {
        f64::from(self.sets) * f64::from(self.reps) * self.weight
    }
}

/// Identity key of a canonical record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkoutKey {
    pub source: Source,
    pub external_id: String,
}

/// Canonical workout record stored in the canonical store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalWorkout {
    pub source: Source,
    /// Unique within `source`
    pub external_id: String,
    pub category: Category,
    pub name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub distance_meters: Option<f64>,
    pub elevation_gain_meters: Option<f64>,
    pub route_polyline: Option<String>,
    pub strength_detail: Option<Vec<StrengthSet>>,
    pub raw_payload: Value,
}

impl CanonicalWorkout {
    pub fn key(&self) -> WorkoutKey {
        WorkoutKey {
            source: self.source,
            external_id: self.external_id.clone(),
        }
    }

    /// Total lifting volume, 0 for non-lift records.
    pub fn strength_volume(&self) -> f64 {
        self.strength_detail
            .as_deref()
            .map_or(0.0, |sets| sets.iter().map(StrengthSet::volume).sum())
    }
}
