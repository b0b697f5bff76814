// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format an optional timestamp, rendering `None` as `"none"`.
pub fn format_optional_utc(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(|| "none".to_string(), format_utc_rfc3339)
}

/// Convert a Unix timestamp (seconds) back to UTC, clamping invalid values to the epoch.
pub fn from_unix_seconds(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Midnight UTC at the start of a calendar date.
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uses_z_suffix() {
        let date = from_unix_seconds(1_704_412_800);
        assert_eq!(format_utc_rfc3339(date), "2024-01-05T00:00:00Z");
    }

    #[test]
    fn test_start_of_day() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        assert_eq!(start_of_day_utc(date).timestamp(), 1_704_499_200);
    }

    #[test]
    fn test_format_optional_none() {
        assert_eq!(format_optional_utc(None), "none");
    }
}
