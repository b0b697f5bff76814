// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod cursor;
pub mod sheet;
pub mod token;
pub mod workout;

pub use activity::RawActivity;
pub use cursor::SyncCursor;
pub use sheet::{RawSheetRow, RowOutcome, SheetReport, SkipReason, SkippedRow};
pub use token::OAuthToken;
pub use workout::{CanonicalWorkout, Category, Source, StrengthSet, WorkoutKey};
