//! Check-in transaction coordinator.
//!
//! # Responsibility
//! - Record a check-in exactly once per allowed interval.
//! - Recompute the streak in the same transaction that appends the row.
//!
//! # Invariants
//! - User read, latest check-in read, interval decision, append and streak
//!   update all happen inside one `BEGIN IMMEDIATE` transaction.
//! - A rejected check-in writes nothing.
//! - Lock contention is retried a bounded number of times, then surfaced as
//!   `StoreConflict`.

use crate::clock::{local_offset, Clock};
use crate::config::EngineConfig;
use crate::db::{DbError, Store};
use crate::model::check_in::CheckIn;
use crate::model::user::UserId;
use crate::repo::check_in_repo::{
    append_check_in_with_streak, CheckInRepository, SqliteCheckInRepository,
};
use crate::repo::error::RepoError;
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::service::interval_policy::can_check_in;
use crate::service::streak::next_streak;
use chrono::FixedOffset;
use log::{info, warn};
use rusqlite::TransactionBehavior;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

/// Committed check-in with the streak it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInReceipt {
    pub check_in: CheckIn,
    pub display_name: String,
    pub previous_streak: u32,
    pub streak: u32,
}

/// Check-in failure modes.
#[derive(Debug)]
pub enum CheckInError {
    UserNotFound(UserId),
    /// Interval violation; carries the human-readable wait message.
    AlreadyCheckedIn { wait_reason: String },
    /// Contention persisted across every attempt.
    StoreConflict { attempts: u32 },
    Repo(RepoError),
}

impl CheckInError {
    fn is_contention(&self) -> bool {
        matches!(self, Self::Repo(err) if err.is_contention())
    }
}

impl Display for CheckInError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::AlreadyCheckedIn { wait_reason } => write!(f, "{wait_reason}"),
            Self::StoreConflict { attempts } => write!(
                f,
                "check-in could not be saved after {attempts} attempts; please try again"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CheckInError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CheckInError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity: "user", id } => Self::UserNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for CheckInError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for CheckInError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

/// Runs the atomic check-in read-modify-write against the store.
#[derive(Clone)]
pub struct CheckInCoordinator {
    store: Store,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    offset: FixedOffset,
}

impl CheckInCoordinator {
    pub fn new(store: Store, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        Self {
            store,
            clock,
            max_attempts: config.transaction_max_attempts.max(1),
            offset: local_offset(config.utc_offset_minutes),
        }
    }

    /// Records one check-in for `user_id`.
    ///
    /// # Errors
    /// - `UserNotFound` when the user does not exist.
    /// - `AlreadyCheckedIn` when the cadence gap has not elapsed.
    /// - `StoreConflict` when contention outlasts every attempt.
    pub fn check_in(&self, user_id: UserId) -> Result<CheckInReceipt, CheckInError> {
        let started_at = Instant::now();

        for attempt in 1..=self.max_attempts {
            match self.try_check_in(user_id) {
                Ok(receipt) => {
                    info!(
                        "event=check_in module=checkin status=ok attempt={} streak={} duration_ms={}",
                        attempt,
                        receipt.streak,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(receipt);
                }
                Err(err) if err.is_contention() => {
                    warn!(
                        "event=check_in module=checkin status=retry attempt={} max_attempts={} error_code=store_contention",
                        attempt, self.max_attempts
                    );
                }
                Err(CheckInError::AlreadyCheckedIn { wait_reason }) => {
                    info!(
                        "event=check_in module=checkin status=rejected reason=interval duration_ms={}",
                        started_at.elapsed().as_millis()
                    );
                    return Err(CheckInError::AlreadyCheckedIn { wait_reason });
                }
                Err(err) => {
                    warn!(
                        "event=check_in module=checkin status=error attempt={} error={}",
                        attempt, err
                    );
                    return Err(err);
                }
            }
        }

        warn!(
            "event=check_in module=checkin status=error error_code=store_conflict attempts={} duration_ms={}",
            self.max_attempts,
            started_at.elapsed().as_millis()
        );
        Err(CheckInError::StoreConflict {
            attempts: self.max_attempts,
        })
    }

    fn try_check_in(&self, user_id: UserId) -> Result<CheckInReceipt, CheckInError> {
        let mut conn = self.store.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let user = SqliteUserRepository::new(&tx)
            .get_user(user_id)?
            .ok_or(CheckInError::UserNotFound(user_id))?;
        let latest = SqliteCheckInRepository::new(&tx).latest_check_in(user_id)?;

        // Read under the write lock so concurrent callers observe a total order.
        let now = self.clock.now();
        let previous_at = latest.map(|check_in| check_in.checked_in_at);
        let decision = can_check_in(previous_at, user.cadence, user.custom_hours, now);
        if !decision.allowed {
            tx.rollback()?;
            return Err(CheckInError::AlreadyCheckedIn {
                wait_reason: decision.wait_reason.unwrap_or_default(),
            });
        }

        let streak = next_streak(previous_at, now, user.cadence, user.streak, self.offset);
        let check_in = CheckIn::new(user_id, now);
        append_check_in_with_streak(&tx, &check_in, streak)?;
        tx.commit()?;

        Ok(CheckInReceipt {
            check_in,
            display_name: user.display_name,
            previous_streak: user.streak,
            streak,
        })
    }
}
