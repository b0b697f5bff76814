// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only totals over the canonical record set.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{CanonicalWorkout, Category, Source};
use crate::time_utils::format_optional_utc;

/// Totals for one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryTotals {
    pub count: usize,
    pub distance_meters: f64,
    pub duration_seconds: u64,
    pub elevation_gain_meters: f64,
    /// Sum of sets × reps × weight
    pub lift_volume: f64,
}

impl CategoryTotals {
    fn add(&mut self, record: &CanonicalWorkout) {
        self.count += 1;
        self.distance_meters += record.distance_meters.unwrap_or(0.0);
        self.duration_seconds += record.duration_seconds;
        self.elevation_gain_meters += record.elevation_gain_meters.unwrap_or(0.0);
        self.lift_volume += record.strength_volume();
    }
}

/// Summary written by `analyze` and `export`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkoutSummary {
    pub total_workouts: usize,
    pub first_workout: Option<DateTime<Utc>>,
    pub last_workout: Option<DateTime<Utc>>,
    pub by_source: BTreeMap<Source, usize>,
    pub by_category: BTreeMap<Category, CategoryTotals>,
}

impl WorkoutSummary {
    pub fn from_records(records: &[CanonicalWorkout]) -> Self {
        let mut summary = Self {
            total_workouts: records.len(),
            ..Self::default()
        };

        for record in records {
            *summary.by_source.entry(record.source).or_default() += 1;
            summary
                .by_category
                .entry(record.category)
                .or_default()
                .add(record);

            summary.first_workout = Some(
                summary
                    .first_workout
                    .map_or(record.start_time, |t| t.min(record.start_time)),
            );
            summary.last_workout = Some(
                summary
                    .last_workout
                    .map_or(record.start_time, |t| t.max(record.start_time)),
            );
        }

        summary
    }
}

impl fmt::Display for WorkoutSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} workouts from {} to {}",
            self.total_workouts,
            format_optional_utc(self.first_workout),
            format_optional_utc(self.last_workout)
        )?;

        for (category, totals) in &self.by_category {
            write!(
                f,
                "  {:<6} {:>5}  {:>9.1} km  {:>7.1} h  {:>8.0} m climb",
                category.as_str(),
                totals.count,
                totals.distance_meters / 1000.0,
                totals.duration_seconds as f64 / 3600.0,
                totals.elevation_gain_meters,
            )?;
            if totals.lift_volume > 0.0 {
                write!(f, "  {:.0} lb lifted", totals.lift_volume)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
