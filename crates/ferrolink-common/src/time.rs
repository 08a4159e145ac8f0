// ============================================
// File: crates/ferrolink-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Provides timestamp handling for protocol freshness checks: handshake
//! material carries a creation time that peers validate against a skew
//! window before trusting it.
//!
//! ## Main Functionality
//! - `Timestamp`: Unix timestamp (seconds) with validation helpers
//! - Freshness checks symmetric in both directions (past and future)
//!
//! ## ⚠️ Important Note for Next Developer
//! - Freshness windows must reject timestamps from the future as well as
//!   the past; a fast clock is as suspicious as a replay
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// Timestamp
// ============================================

/// Unix timestamp in seconds, used for wall-clock freshness validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Returns the current wall-clock time.
    ///
    /// Clocks set before the Unix epoch saturate to zero.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(secs)
    }

    /// Creates a timestamp from Unix seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the timestamp as Unix seconds.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// Returns `true` if this timestamp lies within `window_secs` of the
    /// current time, in either direction.
    #[must_use]
    pub fn is_within(&self, window_secs: u64) -> bool {
        let now = Self::now().0;
        let diff = now.abs_diff(self.0);
        diff <= window_secs
    }

    /// Absolute distance in seconds between two timestamps.
    #[must_use]
    pub const fn abs_delta(&self, other: &Self) -> u64 {
        self.0.abs_diff(other.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_recent() {
        let ts = Timestamp::now();
        assert!(ts.is_within(5));
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let ts = Timestamp::from_secs(Timestamp::now().as_secs() - 3600);
        assert!(!ts.is_within(1800));
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let ts = Timestamp::from_secs(Timestamp::now().as_secs() + 3600);
        assert!(!ts.is_within(1800));
    }

    #[test]
    fn test_abs_delta() {
        let a = Timestamp::from_secs(100);
        let b = Timestamp::from_secs(250);
        assert_eq!(a.abs_delta(&b), 150);
        assert_eq!(b.abs_delta(&a), 150);
    }
}
