//! Public engine facade.
//!
//! # Responsibility
//! - Own the store, transports, clock and config, built once by the host.
//! - Expose check-in, alerting and scan operations plus the settings and
//!   membership helpers a host needs around them.
//!
//! # Invariants
//! - The circle fan-out for a check-in starts only after the check-in
//!   transaction committed.
//! - A fan-out failure is logged on its worker and never changes the
//!   check-in result.

use crate::clock::Clock;
use crate::config::{ConfigError, EngineConfig};
use crate::db::Store;
use crate::model::alert::{AlertTarget, DistressAlert};
use crate::model::check_in::CheckIn;
use crate::model::circle::{Circle, CircleId};
use crate::model::endpoint::DeviceEndpoint;
use crate::model::user::{User, UserId, UserSettings};
use crate::notify::transport::TransportSet;
use crate::repo::alert_repo::{AlertRepository, SqliteAlertRepository};
use crate::repo::check_in_repo::{CheckInRepository, SqliteCheckInRepository};
use crate::repo::circle_repo::{CircleRepository, SqliteCircleRepository};
use crate::repo::endpoint_repo::{EndpointRepository, SqliteEndpointRepository};
use crate::repo::error::RepoResult;
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::service::alert_service::{AlertError, AlertService};
use crate::service::check_in_service::{CheckInCoordinator, CheckInError};
use crate::service::inactivity_scanner::InactivityScanner;
use crate::service::outcome::{
    BatchOutcome, EscalationOutcome, InactivityScanReport, NotOkayOutcome, ScanReport,
    WorkflowOutcome,
};
use log::warn;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Result of a check-in request.
///
/// An interval violation is an expected outcome: `success` is false and
/// `message` says how long to wait.
#[derive(Debug)]
pub struct CheckInOutcome {
    pub success: bool,
    pub message: String,
    pub streak: Option<u32>,
    /// Circle notification started after commit; absent on rejection.
    pub fanout: Option<FanoutTask>,
}

/// Handle to a post-commit circle notification running on its own thread.
///
/// Dropping the handle detaches the task.
#[derive(Debug)]
pub struct FanoutTask {
    handle: JoinHandle<Option<WorkflowOutcome>>,
}

impl FanoutTask {
    /// Blocks until the fan-out finishes. `None` when it failed before
    /// producing a result.
    pub fn wait(self) -> Option<WorkflowOutcome> {
        self.handle.join().ok().flatten()
    }
}

struct EngineInner {
    store: Store,
    config: EngineConfig,
    check_ins: CheckInCoordinator,
    alerts: AlertService,
    scanner: InactivityScanner,
}

/// Check-in and notification engine shared across request handlers.
#[derive(Clone)]
pub struct CircleEngine {
    inner: Arc<EngineInner>,
}

impl CircleEngine {
    /// Builds an engine from explicitly constructed collaborators.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` when `config` fails validation.
    pub fn new(
        store: Store,
        transports: TransportSet,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let check_ins = CheckInCoordinator::new(store.clone(), Arc::clone(&clock), &config);
        let alerts = AlertService::new(store.clone(), transports, clock, &config);
        let scanner = InactivityScanner::new(alerts.clone(), &config);
        Ok(Self {
            inner: Arc::new(EngineInner {
                store,
                config,
                check_ins,
                alerts,
                scanner,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Records a check-in, then notifies the user's circles in the
    /// background.
    ///
    /// # Errors
    /// `UserNotFound`, `StoreConflict` and storage failures. Checking in too
    /// soon is reported through [`CheckInOutcome`] instead.
    pub fn check_in(&self, user_id: UserId) -> Result<CheckInOutcome, CheckInError> {
        match self.inner.check_ins.check_in(user_id) {
            Ok(receipt) => Ok(CheckInOutcome {
                success: true,
                message: streak_message(receipt.streak),
                streak: Some(receipt.streak),
                fanout: self.spawn_fanout(user_id, receipt.display_name),
            }),
            Err(CheckInError::AlreadyCheckedIn { wait_reason }) => Ok(CheckInOutcome {
                success: false,
                message: wait_reason,
                streak: None,
                fanout: None,
            }),
            Err(err) => Err(err),
        }
    }

    fn spawn_fanout(&self, user_id: UserId, user_name: String) -> Option<FanoutTask> {
        let alerts = self.inner.alerts.clone();
        let spawned = thread::Builder::new()
            .name("checkin-fanout".to_string())
            .spawn(move || match alerts.notify_circle_on_check_in(user_id, &user_name) {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    warn!(
                        "event=checkin_fanout module=engine status=error error={}",
                        err
                    );
                    None
                }
            });
        match spawned {
            Ok(handle) => Some(FanoutTask { handle }),
            Err(err) => {
                warn!(
                    "event=checkin_fanout module=engine status=error error_code=spawn_failed error={}",
                    err
                );
                None
            }
        }
    }

    pub fn send_reminder(
        &self,
        recipient_id: UserId,
        sender_name: &str,
        recipient_name: &str,
    ) -> Result<WorkflowOutcome, AlertError> {
        self.inner
            .alerts
            .send_reminder(recipient_id, sender_name, recipient_name)
    }

    pub fn send_reminders_to_inactive_members(
        &self,
        circle_id: CircleId,
        sender_id: UserId,
        sender_name: &str,
    ) -> Result<BatchOutcome, AlertError> {
        self.inner
            .alerts
            .send_reminders_to_inactive_members(circle_id, sender_id, sender_name)
    }

    pub fn notify_circle_on_check_in(
        &self,
        user_id: UserId,
        user_name: &str,
    ) -> Result<WorkflowOutcome, AlertError> {
        self.inner.alerts.notify_circle_on_check_in(user_id, user_name)
    }

    pub fn send_not_okay_alert(
        &self,
        actor_id: UserId,
        actor_name: &str,
        target: AlertTarget,
        message: Option<&str>,
    ) -> Result<NotOkayOutcome, AlertError> {
        self.inner
            .alerts
            .send_not_okay_alert(actor_id, actor_name, target, message)
    }

    pub fn send_emergency_alert(
        &self,
        user_id: UserId,
        user_name: &str,
        days_since_last_check_in: i64,
    ) -> Result<EscalationOutcome, AlertError> {
        self.inner
            .alerts
            .send_emergency_alert(user_id, user_name, days_since_last_check_in)
    }

    pub fn scan_inactivity_and_notify(&self) -> Result<InactivityScanReport, AlertError> {
        self.inner.scanner.scan_inactivity_and_notify()
    }

    pub fn run_daily_reminders(&self) -> Result<ScanReport, AlertError> {
        self.inner.scanner.run_daily_reminders()
    }

    pub fn run_emergency_escalations(&self) -> Result<ScanReport, AlertError> {
        self.inner.scanner.run_emergency_escalations()
    }

    pub fn register_user(&self, user: &User) -> RepoResult<UserId> {
        let conn = self.inner.store.connect()?;
        SqliteUserRepository::new(&conn).create_user(user)
    }

    pub fn get_user(&self, user_id: UserId) -> RepoResult<Option<User>> {
        let conn = self.inner.store.connect()?;
        SqliteUserRepository::new(&conn).get_user(user_id)
    }

    /// Replaces owner-editable settings; the streak is left untouched.
    pub fn update_settings(&self, user_id: UserId, settings: &UserSettings) -> RepoResult<()> {
        let conn = self.inner.store.connect()?;
        SqliteUserRepository::new(&conn).update_settings(user_id, settings)
    }

    pub fn create_circle(&self, name: &str, owner_id: UserId) -> RepoResult<Circle> {
        let conn = self.inner.store.connect()?;
        SqliteCircleRepository::new(&conn).create_circle(name, owner_id)
    }

    /// Returns `false` when the user was already a member.
    pub fn join_circle(&self, circle_id: CircleId, user_id: UserId) -> RepoResult<bool> {
        let conn = self.inner.store.connect()?;
        SqliteCircleRepository::new(&conn).add_member(circle_id, user_id)
    }

    pub fn leave_circle(&self, circle_id: CircleId, user_id: UserId) -> RepoResult<bool> {
        let conn = self.inner.store.connect()?;
        SqliteCircleRepository::new(&conn).remove_member(circle_id, user_id)
    }

    pub fn get_circle(&self, circle_id: CircleId) -> RepoResult<Option<Circle>> {
        let conn = self.inner.store.connect()?;
        SqliteCircleRepository::new(&conn).get_circle(circle_id)
    }

    pub fn register_endpoint(&self, endpoint: &DeviceEndpoint) -> RepoResult<()> {
        let conn = self.inner.store.connect()?;
        SqliteEndpointRepository::new(&conn).register_endpoint(endpoint)
    }

    pub fn remove_endpoint(&self, token: &str) -> RepoResult<bool> {
        let conn = self.inner.store.connect()?;
        SqliteEndpointRepository::new(&conn).remove_endpoint(token)
    }

    /// Most recent check-ins first.
    pub fn list_check_ins(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<CheckIn>> {
        let conn = self.inner.store.connect()?;
        SqliteCheckInRepository::new(&conn).list_check_ins(user_id, limit)
    }

    pub fn list_alerts_for_actor(&self, actor_id: UserId) -> RepoResult<Vec<DistressAlert>> {
        let conn = self.inner.store.connect()?;
        SqliteAlertRepository::new(&conn).list_alerts_for_actor(actor_id)
    }
}

fn streak_message(streak: u32) -> String {
    if streak == 1 {
        "Checked in. Your streak is 1 check-in.".to_string()
    } else {
        format!("Checked in. Your streak is {streak} check-ins.")
    }
}
