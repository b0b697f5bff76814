// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! workout-sync: ingest workouts from Strava and a lifting sheet
//!
//! This crate keeps a local canonical store of workouts reconciled from
//! the Strava activity API and a tab-separated strength-training export,
//! with incremental sync and safe OAuth token refresh.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

pub use error::{Result, SyncError};
