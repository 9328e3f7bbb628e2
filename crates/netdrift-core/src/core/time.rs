// crates/netdrift-core/src/core/time.rs
// ============================================================================
// Module: Netdrift Time Model
// Description: Canonical timestamp representation for records and events.
// Purpose: Provide a single explicit time value embedded in every record.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! All netdrift records carry explicit unix-epoch-millisecond timestamps.
//! The core algorithms (canonicalization, hashing, diffing) never read the
//! clock; only record construction at the storage and detection boundaries
//! does, so comparisons stay deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix-epoch milliseconds.
///
/// # Invariants
/// - Serializes as a plain integer on the wire.
/// - Monotonicity is not guaranteed across hosts; ordering guarantees in the
///   delivery queue come from enqueue sequence, not wall-clock values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix-epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix-epoch milliseconds.
    #[must_use]
    pub const fn unix_millis(self) -> i64 {
        self.0
    }

    /// Reads the current wall-clock time.
    ///
    /// Times before the unix epoch clamp to zero.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    /// Returns this timestamp advanced by the given number of milliseconds.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}
