// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tolerant reader for the tab-separated lifting export.
//!
//! The file is edited by hand in a spreadsheet, so every data line is
//! classified as parsed or skipped and reading never fails.

use chrono::NaiveDate;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::models::{RawSheetRow, RowOutcome, SheetReport, SkipReason};

/// Required header columns, matched case-insensitively.
pub const COLUMNS: [&str; 5] = ["date", "exercise", "sets", "reps", "weight"];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d/%m/%Y"];

/// Reads the lifting export from a local path.
#[derive(Debug, Clone)]
pub struct SheetReader {
    path: PathBuf,
}

impl SheetReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row in file order. An absent file is an empty report.
    pub async fn read_all(&self) -> SheetReport {
        match tokio::fs::read(&self.path).await {
            Ok(contents) => {
                let report = parse_bytes(&contents);
                tracing::info!(
                    path = %self.path.display(),
                    rows = report.rows.len(),
                    skipped = report.skipped.len(),
                    "Read lifting sheet"
                );
                report
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No lifting sheet found");
                SheetReport::default()
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read lifting sheet");
                let mut report = SheetReport::default();
                report.record(0, RowOutcome::Skipped(SkipReason::Unreadable(e.to_string())));
                report
            }
        }
    }
}

/// Column positions resolved from the header line.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    exercise: usize,
    sets: usize,
    reps: usize,
    weight: usize,
    width: usize,
}

impl ColumnMap {
    fn from_header(header: &str) -> Result<Self, SkipReason> {
        let mut names: Vec<String> = header
            .split('\t')
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        while names.last().is_some_and(|n| n.is_empty()) {
            names.pop();
        }
        let find = |name: &str| names.iter().position(|n| n == name);

        let missing: Vec<&'static str> = COLUMNS
            .iter()
            .copied()
            .filter(|c| find(c).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(SkipReason::MissingColumns(missing));
        }

        // Safe: every column was found above.
        let idx = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            date: idx("date"),
            exercise: idx("exercise"),
            sets: idx("sets"),
            reps: idx("reps"),
            weight: idx("weight"),
            width: names.len(),
        })
    }

    fn parse_line(&self, line_no: usize, line: &str) -> RowOutcome {
        let mut cells: Vec<&str> = line.split('\t').map(str::trim).collect();
        // Spreadsheets leave empty cells past the last column.
        while cells.len() > self.width && cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        if cells.len() != self.width {
            return RowOutcome::Skipped(SkipReason::WrongColumnCount {
                expected: self.width,
                found: cells.len(),
            });
        }

        let date = match parse_date(cells[self.date]) {
            Some(date) => date,
            None => {
                return RowOutcome::Skipped(SkipReason::InvalidDate(cells[self.date].to_string()))
            }
        };

        let exercise = cells[self.exercise];
        if exercise.is_empty() {
            return RowOutcome::Skipped(SkipReason::EmptyExercise);
        }

        let parsed = parse_count("sets", cells[self.sets]).and_then(|sets| {
            let reps = parse_count("reps", cells[self.reps])?;
            let weight = parse_weight(cells[self.weight])?;
            Ok((sets, reps, weight))
        });

        match parsed {
            Ok((sets, reps, weight)) => RowOutcome::Parsed(RawSheetRow {
                line: line_no,
                date,
                exercise: exercise.to_string(),
                sets,
                reps,
                weight,
            }),
            Err(reason) => RowOutcome::Skipped(reason),
        }
    }
}

/// Parse the full contents of an export.
pub fn parse_str(contents: &str) -> SheetReport {
    parse_bytes(contents.as_bytes())
}

/// Parse raw file bytes. Lines are decoded one at a time, so a stray
/// non-UTF-8 byte only costs the line it is on.
pub fn parse_bytes(contents: &[u8]) -> SheetReport {
    let mut report = SheetReport::default();
    let mut lines = contents
        .split(|b| *b == b'\n')
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.strip_suffix(b"\r").unwrap_or(line)))
        .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
        .map(|(line_no, line)| {
            let decoded = std::str::from_utf8(line)
                .map_err(|e| SkipReason::InvalidEncoding(e.valid_up_to()));
            (line_no, decoded)
        });

    let Some((header_line, header)) = lines.next() else {
        return report;
    };

    let columns = match header
        .and_then(|h| ColumnMap::from_header(h.trim_start_matches('\u{feff}')))
    {
        Ok(columns) => columns,
        Err(reason) => {
            tracing::warn!(line = header_line, reason = %reason, "Lifting sheet header unusable");
            report.record(header_line, RowOutcome::Skipped(reason));
            return report;
        }
    };

    for (line_no, line) in lines {
        let outcome = match line {
            Ok(line) => columns.parse_line(line_no, line),
            Err(reason) => RowOutcome::Skipped(reason),
        };
        if let RowOutcome::Skipped(reason) = &outcome {
            tracing::warn!(line = line_no, reason = %reason, "Skipping malformed sheet row");
        }
        report.record(line_no, outcome);
    }

    report
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

fn parse_count(column: &'static str, value: &str) -> Result<u32, SkipReason> {
    value.parse().map_err(|_| SkipReason::InvalidNumber {
        column,
        value: value.to_string(),
    })
}

/// Empty weight means bodyweight.
fn parse_weight(value: &str) -> Result<f64, SkipReason> {
    if value.is_empty() {
        return Ok(0.0);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite() && *w >= 0.0)
        .ok_or_else(|| SkipReason::InvalidNumber {
            column: "weight",
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "date\texercise\tsets\treps\tweight";

    #[test]
    fn test_parses_rows_in_order() {
        let report = parse_str(&format!(
            "{HEADER}\n2024-01-05\tbench press\t3\t10\t135\n01/06/2024\tpull-up\t4\t8\t\n"
        ));

        assert!(report.skipped.is_empty());
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].exercise, "bench press");
        assert_eq!(report.rows[0].line, 2);
        assert_eq!(report.rows[1].date, NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        assert_eq!(report.rows[1].weight, 0.0);
    }

    #[test]
    fn test_malformed_rows_are_skipped_not_fatal() {
        let report = parse_str(&format!(
            "{HEADER}\n2024-01-05\tsquat\t3\t5\n2024-01-05\tsquat\tthree\t5\t225\n\
             2024-01-05\tsquat\t3\t5\theavy\nyesterday\tsquat\t3\t5\t225\n\
             2024-01-05\tdeadlift\t1\t5\t315\n"
        ));

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].exercise, "deadlift");
        assert_eq!(report.skipped.len(), 4);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::WrongColumnCount {
                expected: 5,
                found: 4
            }
        );
        assert!(matches!(
            report.skipped[1].reason,
            SkipReason::InvalidNumber { column: "sets", .. }
        ));
        assert!(matches!(
            report.skipped[2].reason,
            SkipReason::InvalidNumber { column: "weight", .. }
        ));
        assert_eq!(report.skipped[3].line, 5);
    }

    #[test]
    fn test_header_found_by_name_in_any_order() {
        let report = parse_str("Weight\tDate\tReps\tSets\tExercise\r\n\r\n95\t2024-02-01\t12\t3\tcurl\r\n");
        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!((row.sets, row.reps, row.weight), (3, 12, 95.0));
        assert_eq!(row.line, 3);
    }

    #[test]
    fn test_missing_header_columns() {
        let report = parse_str("date\texercise\tsets\n2024-01-05\tsquat\t3\n");
        assert!(report.rows.is_empty());
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::MissingColumns(vec!["reps", "weight"])
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_str(""), SheetReport::default());
    }

    #[test]
    fn test_trailing_empty_cells_are_ignored() {
        let report = parse_str(&format!(
            "{HEADER}\t\t\n2024-01-05\tsquat\t5\t5\t225\t\t\n2024-01-06\tsquat\t5\t5\t225\tnote\n"
        ));

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].weight, 225.0);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::WrongColumnCount {
                expected: 5,
                found: 6
            }
        );
    }

    #[test]
    fn test_invalid_utf8_skips_only_that_line() {
        let mut contents = format!("{HEADER}\n2024-01-05\tbench press\t3\t10\t135\n").into_bytes();
        contents.extend_from_slice(b"2024-01-06\tcaf\xe9 curl\t3\t12\t25\n");
        contents.extend_from_slice(b"2024-01-07\tsquat\t5\t5\t225\n");

        let report = parse_bytes(&contents);

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[1].exercise, "squat");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line, 3);
        assert_eq!(report.skipped[0].reason, SkipReason::InvalidEncoding(14));
    }

    #[tokio::test]
    async fn test_absent_file_is_empty() {
        let reader = SheetReader::new("/nonexistent/dir/workouts.tsv");
        assert_eq!(reader.read_all().await, SheetReport::default());
    }
}
