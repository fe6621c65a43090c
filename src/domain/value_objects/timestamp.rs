//! # Timestamp Value Object
//!
//! UTC instant used for transaction times, hold windows and approval audit.
//! Serialized as RFC 3339.
//!
//! ```
//! use settlement_ledger::domain::value_objects::timestamp::Timestamp;
//!
//! let committed = Timestamp::from_secs(1_700_000_000).unwrap();
//! let released = committed.add_secs(3 * 24 * 3600);
//!
//! assert!(released.is_after(&committed));
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A UTC instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Unix seconds, or `None` if out of range.
    #[must_use]
    pub fn from_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    /// Parses an RFC 3339 string in any offset.
    #[must_use]
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value.trim())
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Shifts by `secs`; negative values move backwards.
    #[must_use]
    pub fn add_secs(&self, secs: i64) -> Self {
        Self(self.0 + Duration::seconds(secs))
    }

    /// Moves back whole days, as used for trailing volume windows.
    #[must_use]
    pub fn sub_days(&self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// Adds a hold period. Saturates at the end of representable time, so
    /// an absurd hold never makes a credit available early.
    #[must_use]
    pub fn add_duration(&self, duration: std::time::Duration) -> Self {
        Duration::from_std(duration)
            .ok()
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map_or(Self(DateTime::<Utc>::MAX_UTC), Self)
    }

    /// Strictly earlier than `other`.
    #[inline]
    #[must_use]
    pub fn is_before(&self, other: &Self) -> bool {
        self.0 < other.0
    }

    /// Strictly later than `other`.
    #[inline]
    #[must_use]
    pub fn is_after(&self, other: &Self) -> bool {
        self.0 > other.0
    }

    /// Inside the closed window `[from, to]`.
    #[inline]
    #[must_use]
    pub fn is_within(&self, from: &Self, to: &Self) -> bool {
        from.0 <= self.0 && self.0 <= to.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}
