// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Rows parsed from the tab-separated lifting export.

use chrono::NaiveDate;

/// One exercise line of the lifting sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheetRow {
    /// 1-based line number in the source file
    pub line: usize,
    pub date: NaiveDate,
    pub exercise: String,
    pub sets: u32,
    pub reps: u32,
    pub weight: f64,
}

/// Why a sheet line was skipped. Logged as a warning, never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("expected {expected} columns, found {found}")]
    WrongColumnCount { expected: usize, found: usize },

    #[error("unrecognized date {0:?}")]
    InvalidDate(String),

    #[error("non-numeric {column} {value:?}")]
    InvalidNumber { column: &'static str, value: String },

    #[error("empty exercise name")]
    EmptyExercise,

    #[error("header is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error("line is not valid UTF-8 (valid up to byte {0})")]
    InvalidEncoding(usize),

    #[error("file could not be read: {0}")]
    Unreadable(String),
}

/// Parse result for a single line.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Parsed(RawSheetRow),
    Skipped(SkipReason),
}

/// A skipped line together with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 1-based line number; 0 when the whole file was affected
    pub line: usize,
    pub reason: SkipReason,
}

/// Typed result of reading the sheet: accepted rows in file order plus warnings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetReport {
    pub rows: Vec<RawSheetRow>,
    pub skipped: Vec<SkippedRow>,
}

impl SheetReport {
    pub fn record(&mut self, line: usize, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Parsed(row) => self.rows.push(row),
            RowOutcome::Skipped(reason) => self.skipped.push(SkippedRow { line, reason }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
