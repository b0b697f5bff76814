// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rate-limit state parsed from API response headers.
//!
//! Strava reports two windows (15 minutes and daily) as comma-separated pairs:
//! `X-RateLimit-Limit: 100,1000` and `X-RateLimit-Usage: 42,310`. Read
//! endpoints carry a second, smaller quota in `X-ReadRateLimit-Limit` and
//! `X-ReadRateLimit-Usage`; the tighter of the two families applies. Generic
//! `X-RateLimit-Remaining` / `X-RateLimit-Reset` headers win when present.

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use reqwest::header::HeaderMap;
use std::time::Duration;

const SHORT_WINDOW_MINUTES: i64 = 15;

/// `(limit, usage)` header pairs: overall quota, then the read-only quota.
const QUOTA_HEADERS: [(&str, &str); 2] = [
    ("x-ratelimit-limit", "x-ratelimit-usage"),
    ("x-readratelimit-limit", "x-readratelimit-usage"),
];

/// Most recently observed quota state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Requests left in the tightest window (None if the server did not say)
    pub remaining: Option<u32>,
    /// When the exhausted window resets
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitStatus {
    /// Parse rate-limit headers observed at `now`.
    pub fn from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Self {
        let explicit_remaining = header_values(headers, "x-ratelimit-remaining")
            .and_then(|values| values.into_iter().min());
        let explicit_reset = header_values(headers, "x-ratelimit-reset")
            .and_then(|values| values.into_iter().max())
            .and_then(|secs| DateTime::from_timestamp(i64::from(secs), 0));

        if explicit_remaining.is_some() {
            return Self {
                remaining: explicit_remaining,
                reset_at: explicit_reset,
            };
        }

        QUOTA_HEADERS
            .iter()
            .filter_map(|(limit, usage)| {
                let limits = header_values(headers, limit)?;
                let usage = header_values(headers, usage)?;
                Some(Self::from_windows(&limits, &usage, now))
            })
            .reduce(Self::tightest)
            .unwrap_or_default()
    }

    /// Combine two quota families: fewest requests left, and the latest
    /// reset among the exhausted ones.
    fn tightest(self, other: Self) -> Self {
        let remaining = match (self.remaining, other.remaining) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let reset_at = match (self.is_exhausted(), other.is_exhausted()) {
            (true, false) => self.reset_at,
            (false, true) => other.reset_at,
            _ => self.reset_at.max(other.reset_at),
        };
        Self {
            remaining,
            reset_at,
        }
    }

    /// Derive state from Strava's `(short, daily)` limit/usage pairs.
    fn from_windows(limits: &[u32], usage: &[u32], now: DateTime<Utc>) -> Self {
        let resets = [next_short_window(now), next_midnight(now)];

        let mut remaining: Option<u32> = None;
        let mut exhausted_reset: Option<DateTime<Utc>> = None;

        for (idx, (limit, used)) in limits.iter().zip(usage).enumerate() {
            let left = limit.saturating_sub(*used);
            remaining = Some(remaining.map_or(left, |r| r.min(left)));

            if left == 0 {
                let reset = resets.get(idx).copied().unwrap_or(resets[1]);
                exhausted_reset = Some(exhausted_reset.map_or(reset, |r| r.max(reset)));
            }
        }

        Self {
            remaining,
            reset_at: exhausted_reset.or(Some(resets[0])),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// How long to suspend before the next request, capped at `max_wait`.
    ///
    /// `None` when quota remains. An exhausted quota with no known reset
    /// waits the full cap.
    pub fn wait_needed(&self, now: DateTime<Utc>, max_wait: Duration) -> Option<Duration> {
        if !self.is_exhausted() {
            return None;
        }

        let wait = match self.reset_at {
            Some(reset) if reset > now => (reset - now).to_std().unwrap_or(max_wait),
            Some(_) => return None,
            None => max_wait,
        };
        Some(wait.min(max_wait))
    }
}

/// Parse a header holding one or more comma-separated integers.
fn header_values(headers: &HeaderMap, name: &str) -> Option<Vec<u32>> {
    let raw = headers.get(name)?.to_str().ok()?;
    let values: Vec<u32> = raw
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    (!values.is_empty()).then_some(values)
}

fn next_short_window(now: DateTime<Utc>) -> DateTime<Utc> {
    let window = ChronoDuration::minutes(SHORT_WINDOW_MINUTES);
    now.duration_trunc(window).map_or(now + window, |start| start + window)
}

fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(now + ChronoDuration::days(1), |dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_explicit_headers_win() {
        let now = at("2024-01-05T10:07:00Z");
        let status = RateLimitStatus::from_headers(
            &headers(&[
                ("x-ratelimit-remaining", "0"),
                ("x-ratelimit-reset", "1704449400"),
                ("x-ratelimit-limit", "100,1000"),
                ("x-ratelimit-usage", "1,1"),
            ]),
            now,
        );
        assert_eq!(status.remaining, Some(0));
        assert_eq!(status.reset_at, DateTime::from_timestamp(1_704_449_400, 0));
    }

    #[test]
    fn test_strava_short_window_exhausted() {
        let now = at("2024-01-05T10:07:00Z");
        let status = RateLimitStatus::from_headers(
            &headers(&[
                ("x-ratelimit-limit", "100,1000"),
                ("x-ratelimit-usage", "100,350"),
            ]),
            now,
        );
        assert!(status.is_exhausted());
        assert_eq!(status.reset_at, Some(at("2024-01-05T10:15:00Z")));
        assert_eq!(
            status.wait_needed(now, Duration::from_secs(3600)),
            Some(Duration::from_secs(8 * 60))
        );
    }

    #[test]
    fn test_strava_daily_window_exhausted_waits_until_midnight_capped() {
        let now = at("2024-01-05T22:00:00Z");
        let status = RateLimitStatus::from_headers(
            &headers(&[
                ("x-ratelimit-limit", "100,1000"),
                ("x-ratelimit-usage", "10,1000"),
            ]),
            now,
        );
        assert_eq!(status.reset_at, Some(at("2024-01-06T00:00:00Z")));
        assert_eq!(
            status.wait_needed(now, Duration::from_secs(900)),
            Some(Duration::from_secs(900))
        );
    }

    #[test]
    fn test_remaining_quota_needs_no_wait() {
        let now = at("2024-01-05T10:07:00Z");
        let status = RateLimitStatus::from_headers(
            &headers(&[
                ("x-ratelimit-limit", "100,1000"),
                ("x-ratelimit-usage", "40,350"),
            ]),
            now,
        );
        assert_eq!(status.remaining, Some(60));
        assert_eq!(status.wait_needed(now, Duration::from_secs(900)), None);
    }

    #[test]
    fn test_exhausted_read_quota_wins_over_overall_quota() {
        let now = at("2024-01-05T10:07:00Z");
        let status = RateLimitStatus::from_headers(
            &headers(&[
                ("x-ratelimit-limit", "200,2000"),
                ("x-ratelimit-usage", "100,350"),
                ("x-readratelimit-limit", "100,1000"),
                ("x-readratelimit-usage", "100,350"),
            ]),
            now,
        );
        assert!(status.is_exhausted());
        assert_eq!(status.reset_at, Some(at("2024-01-05T10:15:00Z")));
        assert_eq!(
            status.wait_needed(now, Duration::from_secs(900)),
            Some(Duration::from_secs(8 * 60))
        );
    }

    #[test]
    fn test_read_daily_quota_exhausted_resets_at_midnight() {
        let now = at("2024-01-05T22:00:00Z");
        let status = RateLimitStatus::from_headers(
            &headers(&[
                ("x-ratelimit-limit", "200,2000"),
                ("x-ratelimit-usage", "0,0"),
                ("x-readratelimit-limit", "100,1000"),
                ("x-readratelimit-usage", "20,1000"),
            ]),
            now,
        );
        assert_eq!(status.remaining, Some(0));
        assert_eq!(status.reset_at, Some(at("2024-01-06T00:00:00Z")));
    }

    #[test]
    fn test_read_quota_alone_is_used() {
        let now = at("2024-01-05T10:07:00Z");
        let status = RateLimitStatus::from_headers(
            &headers(&[
                ("x-readratelimit-limit", "100,1000"),
                ("x-readratelimit-usage", "70,350"),
            ]),
            now,
        );
        assert_eq!(status.remaining, Some(30));
        assert!(!status.is_exhausted());
    }

    #[test]
    fn test_missing_headers_is_unknown() {
        let status = RateLimitStatus::from_headers(&HeaderMap::new(), Utc::now());
        assert_eq!(status, RateLimitStatus::default());
        assert!(!status.is_exhausted());
    }
}
