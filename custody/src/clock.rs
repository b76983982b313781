//! # Clock Substrate
//!
//! Time in the custody substrate is a `u64` count of milliseconds since
//! the Unix epoch, wrapped in [`Timestamp`]. Durations expressed in days
//! convert through [`MS_PER_DAY`] exactly once, at the call site that
//! needs them. Every comparison in the protocol is milliseconds against
//! milliseconds, so there is no unit mixing to get wrong.
//!
//! [`Clock`] is the time source handed into protocol operations. The
//! system variant reads the wall clock; the manual variant is fixed and
//! advanced explicitly, which is what deterministic tests want.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds in one day.
pub const MS_PER_DAY: u64 = 86_400_000;

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// A point in time, in milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from raw milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Returns the raw millisecond value.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Adds a millisecond offset, returning `None` on overflow.
    pub fn checked_add_millis(&self, ms: u64) -> Option<Timestamp> {
        self.0.checked_add(ms).map(Timestamp)
    }

    /// Adds a millisecond offset, clamping at `u64::MAX`.
    ///
    /// Callers that have already bounded their inputs (rental durations
    /// are capped well below the overflow horizon) use this to keep the
    /// arithmetic total.
    pub fn saturating_add_millis(&self, ms: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(ms))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// A source of [`Timestamp`]s.
///
/// Protocol operations take `&Clock` rather than calling the wall clock
/// directly, so that time-gated behavior (rental expiry) is testable
/// without sleeping.
#[derive(Debug)]
pub struct Clock {
    source: Source,
}

#[derive(Debug)]
enum Source {
    /// Wall-clock time via chrono.
    System,
    /// Manually controlled time, advanced explicitly.
    Manual(AtomicU64),
}

impl Clock {
    /// A clock backed by the system wall clock.
    pub fn system() -> Self {
        Self {
            source: Source::System,
        }
    }

    /// A manually controlled clock starting at the given instant.
    pub fn manual(start: Timestamp) -> Self {
        Self {
            source: Source::Manual(AtomicU64::new(start.as_millis())),
        }
    }

    /// The current time according to this clock.
    pub fn now(&self) -> Timestamp {
        match &self.source {
            // A pre-1970 system clock would produce a negative count;
            // clamp instead of wrapping into the far future.
            Source::System => Timestamp(Utc::now().timestamp_millis().max(0) as u64),
            Source::Manual(ms) => Timestamp(ms.load(Ordering::Relaxed)),
        }
    }

    /// Advances a manual clock by `ms` milliseconds, saturating at
    /// `u64::MAX`. Has no effect on a system clock.
    pub fn advance_millis(&self, ms: u64) {
        if let Source::Manual(current) = &self.source {
            let now = current.load(Ordering::Relaxed);
            current.store(now.saturating_add(ms), Ordering::Relaxed);
        }
    }

    /// Advances a manual clock by whole days.
    pub fn advance_days(&self, days: u64) {
        self.advance_millis(days.saturating_mul(MS_PER_DAY));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_fixed_until_advanced() {
        let clock = Clock::manual(Timestamp::from_millis(1_000));
        assert_eq!(clock.now(), Timestamp::from_millis(1_000));
        assert_eq!(clock.now(), Timestamp::from_millis(1_000));
    }

    #[test]
    fn manual_clock_advances() {
        let clock = Clock::manual(Timestamp::from_millis(0));
        clock.advance_millis(250);
        assert_eq!(clock.now(), Timestamp::from_millis(250));
        clock.advance_days(2);
        assert_eq!(clock.now(), Timestamp::from_millis(250 + 2 * MS_PER_DAY));
    }

    #[test]
    fn system_clock_is_past_2020() {
        let clock = Clock::system();
        // 2020-01-01 in epoch milliseconds.
        assert!(clock.now().as_millis() > 1_577_836_800_000);
    }

    #[test]
    fn checked_add_detects_overflow() {
        let ts = Timestamp::from_millis(u64::MAX - 10);
        assert!(ts.checked_add_millis(10).is_some());
        assert!(ts.checked_add_millis(11).is_none());
        assert_eq!(ts.saturating_add_millis(100).as_millis(), u64::MAX);
    }

    #[test]
    fn timestamp_ordering() {
        assert!(Timestamp::from_millis(5) < Timestamp::from_millis(6));
    }

    #[test]
    fn timestamp_serialization_roundtrip() {
        let ts = Timestamp::from_millis(42);
        let json = serde_json::to_string(&ts).unwrap();
        let recovered: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, recovered);
    }
}
