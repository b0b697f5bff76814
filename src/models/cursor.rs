// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Per-source sync watermark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Source;

/// Last fully reconciled timestamp for a source. Never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub source: Source,
    pub last_synced: DateTime<Utc>,
}

impl SyncCursor {
    pub fn new(source: Source, last_synced: DateTime<Utc>) -> Self {
        Self {
            source,
            last_synced,
        }
    }

    /// Combine with a candidate value, keeping the later timestamp.
    pub fn advance(self, candidate: DateTime<Utc>) -> Self {
        Self {
            source: self.source,
            last_synced: self.last_synced.max(candidate),
        }
    }
}
