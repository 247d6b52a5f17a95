//! Rolling streak calculation.
//!
//! Streaks count calendar days in the configured local offset, whatever the
//! sub-day cadence. Weekly cadence increments on any 1..=7 day gap (elapsed
//! days, not calendar weeks).
//!
//! A new check-in dated before the previous one (clock skew) keeps the
//! current streak.

use crate::clock::calendar_day_diff;
use crate::model::user::Cadence;
use chrono::{DateTime, FixedOffset, Utc};

/// Computes the streak after a check-in at `now`.
pub fn next_streak(
    previous_check_in: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cadence: Cadence,
    current_streak: u32,
    offset: FixedOffset,
) -> u32 {
    let Some(previous) = previous_check_in else {
        return 1;
    };
    let day_diff = calendar_day_diff(previous, now, offset);
    let incremented = current_streak.saturating_add(1);

    match cadence {
        Cadence::Weekly => match day_diff {
            1..=7 => incremented,
            diff if diff > 7 => 1,
            _ => current_streak,
        },
        Cadence::Daily | Cadence::Hourly | Cadence::TwiceDaily | Cadence::Custom => {
            match day_diff {
                1 => incremented,
                diff if diff > 1 => 1,
                _ => current_streak,
            }
        }
    }
}
