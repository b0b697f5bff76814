// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File exports read from the canonical store: JSON data and route GeoJSON.

use geo::{BoundingRect, LineString, Rect};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::models::CanonicalWorkout;
use crate::services::summary::WorkoutSummary;
use crate::time_utils::format_utc_rfc3339;

pub const WORKOUTS_FILE: &str = "workouts.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const ROUTES_FILE: &str = "routes.geojson";

/// Errors from writing export files.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Failed to serialize export: {0}")]
    Serialize(String),
}

/// Write `workouts.json` and `summary.json` into `dir`.
pub async fn export_json(records: &[CanonicalWorkout], dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    let summary = WorkoutSummary::from_records(records);

    let workouts_path = dir.join(WORKOUTS_FILE);
    let summary_path = dir.join(SUMMARY_FILE);
    write_json(&workouts_path, records).await?;
    write_json(&summary_path, &summary).await?;

    tracing::info!(
        dir = %dir.display(),
        workouts = records.len(),
        "Exported workout data"
    );
    Ok(vec![workouts_path, summary_path])
}

/// Routes decoded from remote records.
#[derive(Debug)]
pub struct RouteCollection {
    pub features: FeatureCollection,
    /// Records whose polyline could not be decoded
    pub skipped: usize,
}

/// Decode every route polyline (precision 5) into a `LineString` feature.
pub fn build_routes(records: &[CanonicalWorkout]) -> RouteCollection {
    let mut features = Vec::new();
    let mut bounds: Option<Rect<f64>> = None;
    let mut skipped = 0;

    for record in records {
        let Some(encoded) = record.route_polyline.as_deref() else {
            continue;
        };

        let line = match polyline::decode_polyline(encoded, 5) {
            Ok(line) if line.0.len() >= 2 => line,
            Ok(_) => continue,
            Err(e) => {
                skipped += 1;
                tracing::warn!(external_id = %record.external_id, error = %e, "Skipping undecodable route");
                continue;
            }
        };

        if let Some(rect) = line.bounding_rect() {
            bounds = Some(bounds.map_or(rect, |b| union(b, rect)));
        }
        features.push(route_feature(record, &line));
    }

    RouteCollection {
        features: FeatureCollection {
            bbox: bounds.map(|b| vec![b.min().x, b.min().y, b.max().x, b.max().y]),
            features,
            foreign_members: None,
        },
        skipped,
    }
}

/// Write `routes.geojson` into `dir`.
pub async fn export_routes(records: &[CanonicalWorkout], dir: &Path) -> Result<PathBuf, ExportError> {
    let routes = build_routes(records);
    let path = dir.join(ROUTES_FILE);
    write_json(&path, &routes.features).await?;

    tracing::info!(
        path = %path.display(),
        routes = routes.features.features.len(),
        skipped = routes.skipped,
        "Exported routes"
    );
    Ok(path)
}

fn route_feature(record: &CanonicalWorkout, line: &LineString<f64>) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("external_id".to_string(), json!(record.external_id));
    properties.insert("category".to_string(), json!(record.category));
    properties.insert("name".to_string(), json!(record.name));
    properties.insert(
        "start_time".to_string(),
        json!(format_utc_rfc3339(record.start_time)),
    );
    properties.insert("distance_meters".to_string(), json!(record.distance_meters));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(line))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn union(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
        (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
    )
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExportError> {
    let io_error = |e: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    let body = serde_json::to_vec_pretty(value).map_err(|e| ExportError::Serialize(e.to_string()))?;
    tokio::fs::write(path, body).await.map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Source};
    use crate::time_utils::from_unix_seconds;
    use serde_json::Value;

    fn record(id: &str, polyline: Option<&str>) -> CanonicalWorkout {
        CanonicalWorkout {
            source: Source::Remote,
            external_id: id.to_string(),
            category: Category::Run,
            name: Some("Morning Run".to_string()),
            start_time: from_unix_seconds(1_704_470_000),
            duration_seconds: 1800,
            distance_meters: Some(5000.0),
            elevation_gain_meters: None,
            route_polyline: polyline.map(str::to_string),
            strength_detail: None,
            raw_payload: Value::Null,
        }
    }

    #[test]
    fn test_routes_decode_to_linestrings() {
        let records = [
            record("1", Some("_p~iF~ps|U_ulLnnqC_mqNvxq`@")),
            record("2", None),
        ];

        let routes = build_routes(&records);
        assert_eq!(routes.skipped, 0);
        assert_eq!(routes.features.features.len(), 1);

        let json = serde_json::to_value(&routes.features).unwrap();
        let feature = &json["features"][0];
        assert_eq!(feature["geometry"]["type"], "LineString");
        assert_eq!(feature["properties"]["category"], "run");
        let first = &feature["geometry"]["coordinates"][0];
        assert!((first[0].as_f64().unwrap() + 120.2).abs() < 1e-6);
        assert!((first[1].as_f64().unwrap() - 38.5).abs() < 1e-6);

        let bbox = routes.features.bbox.unwrap();
        assert!((bbox[0] + 126.453).abs() < 1e-6);
        assert!((bbox[3] - 43.252).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_export_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("site");

        let written = export_json(&[record("1", None)], &out).await.unwrap();
        assert_eq!(written.len(), 2);

        let workouts: Vec<CanonicalWorkout> =
            serde_json::from_slice(&std::fs::read(out.join(WORKOUTS_FILE)).unwrap()).unwrap();
        assert_eq!(workouts[0].external_id, "1");

        let summary: Value =
            serde_json::from_slice(&std::fs::read(out.join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(summary["total_workouts"], 1);
    }
}
