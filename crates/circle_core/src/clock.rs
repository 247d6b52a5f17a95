//! Injectable time source and calendar-day helpers.
//!
//! # Responsibility
//! - Give every time-dependent component one explicit `now()`.
//! - Evaluate calendar days in the configured local offset.
//!
//! # Invariants
//! - Timestamps are UTC; only calendar-day math applies the offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use std::sync::Mutex;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic callers and tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock to an absolute instant.
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = now;
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builds the local offset from a minute count, falling back to UTC when
/// the value is outside the representable range.
pub fn local_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

/// Calendar date of `instant` in `offset`.
pub fn local_day(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Whole calendar days from `earlier` to `later` in `offset`.
///
/// Negative when `later` falls on an earlier calendar day.
pub fn calendar_day_diff(earlier: DateTime<Utc>, later: DateTime<Utc>, offset: FixedOffset) -> i64 {
    (local_day(later, offset) - local_day(earlier, offset)).num_days()
}

#[cfg(test)]
mod tests {
    use super::{calendar_day_diff, local_offset, Clock, FixedClock};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn day_diff_uses_calendar_boundaries_not_elapsed_hours() {
        let late = Utc.with_ymd_and_hms(2025, 3, 1, 23, 30, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2025, 3, 2, 0, 15, 0).unwrap();
        assert_eq!(calendar_day_diff(late, early, local_offset(0)), 1);
    }

    #[test]
    fn day_diff_respects_local_offset() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 22, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 3, 2, 1, 0, 0).unwrap();
        // UTC-05:00: both instants fall on March 1st locally.
        assert_eq!(calendar_day_diff(a, b, local_offset(-300)), 0);
    }

    #[test]
    fn fixed_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::hours(3));
        assert_eq!(clock.now(), start + Duration::hours(3));
    }
}
