// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token pair owned by the token manager.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access/refresh token pair with the access token's expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl OAuthToken {
    /// True if the access token stays valid for longer than `margin` after `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        !self.access_token.is_empty() && now + margin < self.expires_at
    }

    /// Token pair holding only a refresh token, forcing a refresh on first use.
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: String::new(),
            refresh_token: refresh_token.into(),
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: DateTime<Utc>) -> OAuthToken {
        OAuthToken {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_fresh_outside_margin() {
        let now = Utc::now();
        assert!(token(now + Duration::seconds(120)).is_fresh(now, Duration::seconds(60)));
    }

    #[test]
    fn test_stale_inside_margin() {
        let now = Utc::now();
        assert!(!token(now + Duration::seconds(30)).is_fresh(now, Duration::seconds(60)));
    }

    #[test]
    fn test_refresh_only_token_is_never_fresh() {
        let t = OAuthToken::from_refresh_token("r");
        assert!(!t.is_fresh(DateTime::<Utc>::UNIX_EPOCH, Duration::zero()));
    }

    #[test]
    fn test_debug_hides_tokens() {
        let rendered = format!("{:?}", token(Utc::now()));
        assert!(!rendered.contains("access\""));
        assert!(rendered.contains("[redacted]"));
    }
}
