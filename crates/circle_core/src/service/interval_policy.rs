//! Minimum-gap policy between check-ins.
//!
//! # Responsibility
//! - Map a cadence to its minimum gap in hours.
//! - Decide whether a check-in is allowed now and phrase the wait otherwise.
//!
//! # Invariants
//! - Custom hours are clamped to `1..=168`; an unset value means 24.
//! - Remaining waits under one hour are phrased in minutes, otherwise hours.
//! - Pure: no clock or store access.

use crate::model::user::Cadence;
use crate::model::validation::{MAX_CUSTOM_HOURS, MIN_CUSTOM_HOURS};
use chrono::{DateTime, Duration, Utc};

const DEFAULT_CUSTOM_HOURS: u32 = 24;

/// Outcome of one interval check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalDecision {
    pub allowed: bool,
    /// Human-readable wait message; `None` when allowed.
    pub wait_reason: Option<String>,
}

impl IntervalDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            wait_reason: None,
        }
    }
}

/// Minimum gap between two check-ins for `cadence`, in hours.
pub fn min_gap_hours(cadence: Cadence, custom_hours: Option<u32>) -> u32 {
    match cadence {
        Cadence::Hourly => 1,
        Cadence::TwiceDaily => 12,
        Cadence::Daily => 24,
        Cadence::Weekly => 168,
        Cadence::Custom => custom_hours
            .unwrap_or(DEFAULT_CUSTOM_HOURS)
            .clamp(MIN_CUSTOM_HOURS, MAX_CUSTOM_HOURS),
    }
}

pub fn min_gap(cadence: Cadence, custom_hours: Option<u32>) -> Duration {
    Duration::hours(i64::from(min_gap_hours(cadence, custom_hours)))
}

/// Decides whether a check-in at `now` respects the cadence gap since
/// `last_check_in`.
pub fn can_check_in(
    last_check_in: Option<DateTime<Utc>>,
    cadence: Cadence,
    custom_hours: Option<u32>,
    now: DateTime<Utc>,
) -> IntervalDecision {
    let Some(last) = last_check_in else {
        return IntervalDecision::allowed();
    };

    let remaining = last + min_gap(cadence, custom_hours) - now;
    if remaining <= Duration::zero() {
        return IntervalDecision::allowed();
    }

    IntervalDecision {
        allowed: false,
        wait_reason: Some(wait_message(remaining)),
    }
}

fn wait_message(remaining: Duration) -> String {
    let seconds = remaining.num_seconds().max(1);
    if remaining < Duration::hours(1) {
        let minutes = ceil_div(seconds, 60);
        format!(
            "You've already checked in. You can check in again in {minutes} {}.",
            plural(minutes, "minute")
        )
    } else {
        let hours = ceil_div(seconds, 3600);
        format!(
            "You've already checked in. You can check in again in {hours} {}.",
            plural(hours, "hour")
        )
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1) / divisor
}

fn plural(count: i64, unit: &'static str) -> String {
    if count == 1 {
        unit.to_string()
    } else {
        format!("{unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::{can_check_in, min_gap_hours};
    use crate::model::user::Cadence;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    const CADENCES: [Cadence; 5] = [
        Cadence::Hourly,
        Cadence::TwiceDaily,
        Cadence::Daily,
        Cadence::Weekly,
        Cadence::Custom,
    ];

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn gap_table_matches_cadences() {
        assert_eq!(min_gap_hours(Cadence::Hourly, None), 1);
        assert_eq!(min_gap_hours(Cadence::TwiceDaily, None), 12);
        assert_eq!(min_gap_hours(Cadence::Daily, None), 24);
        assert_eq!(min_gap_hours(Cadence::Weekly, None), 168);
        assert_eq!(min_gap_hours(Cadence::Custom, None), 24);
        assert_eq!(min_gap_hours(Cadence::Custom, Some(0)), 1);
        assert_eq!(min_gap_hours(Cadence::Custom, Some(500)), 168);
        assert_eq!(min_gap_hours(Cadence::Custom, Some(36)), 36);
        // custom hours are ignored for fixed cadences
        assert_eq!(min_gap_hours(Cadence::Daily, Some(3)), 24);
    }

    #[test]
    fn first_check_in_is_always_allowed() {
        let decision = can_check_in(None, Cadence::Weekly, None, base());
        assert!(decision.allowed);
        assert!(decision.wait_reason.is_none());
    }

    #[test]
    fn hourly_wait_is_phrased_in_minutes() {
        let decision = can_check_in(
            Some(base()),
            Cadence::Hourly,
            None,
            base() + Duration::minutes(20),
        );
        assert!(!decision.allowed);
        assert_eq!(
            decision.wait_reason.as_deref(),
            Some("You've already checked in. You can check in again in 40 minutes.")
        );
    }

    #[test]
    fn daily_wait_is_phrased_in_hours() {
        let decision = can_check_in(
            Some(base()),
            Cadence::Daily,
            None,
            base() + Duration::hours(1),
        );
        assert_eq!(
            decision.wait_reason.as_deref(),
            Some("You've already checked in. You can check in again in 23 hours.")
        );
    }

    #[test]
    fn singular_units() {
        let minute = can_check_in(
            Some(base()),
            Cadence::Hourly,
            None,
            base() + Duration::seconds(3590),
        );
        assert!(minute
            .wait_reason
            .as_deref()
            .unwrap_or_default()
            .ends_with("in 1 minute."));

        let hour = can_check_in(
            Some(base()),
            Cadence::TwiceDaily,
            None,
            base() + Duration::hours(11),
        );
        assert!(hour
            .wait_reason
            .as_deref()
            .unwrap_or_default()
            .ends_with("in 1 hour."));
    }

    proptest! {
        #[test]
        fn blocked_inside_gap_with_unit_by_remaining(
            cadence_index in 0usize..5,
            custom in 1u32..=168,
            elapsed_fraction in 0.0f64..1.0,
        ) {
            let cadence = CADENCES[cadence_index];
            let gap_seconds = i64::from(min_gap_hours(cadence, Some(custom))) * 3600;
            let elapsed = ((gap_seconds as f64) * elapsed_fraction) as i64;
            prop_assume!(elapsed < gap_seconds);

            let decision = can_check_in(
                Some(base()),
                cadence,
                Some(custom),
                base() + Duration::seconds(elapsed),
            );
            prop_assert!(!decision.allowed);
            let reason = decision.wait_reason.unwrap_or_default();
            if gap_seconds - elapsed < 3600 {
                prop_assert!(reason.contains("minute"));
            } else {
                prop_assert!(reason.contains("hour"));
            }
        }

        #[test]
        fn allowed_once_gap_elapsed(
            cadence_index in 0usize..5,
            custom in 1u32..=168,
            extra_seconds in 0i64..(30 * 24 * 3600),
        ) {
            let cadence = CADENCES[cadence_index];
            let gap = Duration::hours(i64::from(min_gap_hours(cadence, Some(custom))));
            let decision = can_check_in(
                Some(base()),
                cadence,
                Some(custom),
                base() + gap + Duration::seconds(extra_seconds),
            );
            prop_assert!(decision.allowed);
        }
    }
}
