//! Timer-driven batch scans.
//!
//! # Responsibility
//! - Daily reminder sweep over every circle.
//! - Emergency escalation sweep over every user with alerts enabled.
//!
//! # Invariants
//! - One entity's failure is logged and counted; the scan continues.
//! - A user already escalated on the current local day is not escalated
//!   again.

use crate::clock::local_day;
use crate::config::EngineConfig;
use crate::model::user::User;
use crate::repo::alert_repo::{AlertRepository, SqliteAlertRepository};
use crate::repo::check_in_repo::{CheckInRepository, SqliteCheckInRepository};
use crate::repo::circle_repo::{CircleRepository, SqliteCircleRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::service::alert_service::{AlertError, AlertService};
use crate::service::outcome::{InactivityScanReport, ScanReport};
use log::{info, warn};
use rusqlite::Connection;
use std::time::Instant;

/// Batch entry points invoked by an external timer.
#[derive(Clone)]
pub struct InactivityScanner {
    alerts: AlertService,
    threshold_days: i64,
}

enum Escalation {
    NotDue,
    Sent,
    Failed,
    Skipped(&'static str),
}

impl InactivityScanner {
    pub fn new(alerts: AlertService, config: &EngineConfig) -> Self {
        Self {
            alerts,
            threshold_days: config.escalation_threshold_days,
        }
    }

    /// Runs the reminder sweep, then the escalation sweep.
    pub fn scan_inactivity_and_notify(&self) -> Result<InactivityScanReport, AlertError> {
        Ok(InactivityScanReport {
            reminders: self.run_daily_reminders()?,
            escalations: self.run_emergency_escalations()?,
        })
    }

    /// Reminds inactive members of every circle. The first stored member
    /// only lends their name as sender and is reminded like everyone else.
    ///
    /// # Errors
    /// Only failures to list circles abort the scan.
    pub fn run_daily_reminders(&self) -> Result<ScanReport, AlertError> {
        let started_at = Instant::now();
        let conn = self.alerts.store().connect()?;
        let circles = SqliteCircleRepository::new(&conn).list_circles()?;
        let users = SqliteUserRepository::new(&conn);

        let mut report = ScanReport::default();
        for circle in circles {
            report.scanned += 1;
            let Some(sender_id) = circle.first_member() else {
                report.skip(circle.id, "circle has no members");
                continue;
            };
            let sender = match users.get_user(sender_id) {
                Ok(Some(sender)) => sender,
                Ok(None) => {
                    report.skip(circle.id, "sender record missing");
                    continue;
                }
                Err(err) => {
                    warn!(
                        "event=reminder_scan module=scanner status=item_error error={}",
                        err
                    );
                    report.failed += 1;
                    continue;
                }
            };

            let batch = self
                .alerts
                .remind_inactive(&conn, &circle, None, &sender.display_name);
            report.sent += batch.sent;
            report.failed += batch.failed;
            report.skipped.extend(batch.skipped);
        }

        info!(
            "event=reminder_scan module=scanner status=done scanned={} sent={} failed={} skipped={} duration_ms={}",
            report.scanned,
            report.sent,
            report.failed,
            report.skipped.len(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Escalates every opted-in user whose last check-in is at least the
    /// configured number of days old.
    ///
    /// # Errors
    /// Only failures to list users abort the scan.
    pub fn run_emergency_escalations(&self) -> Result<ScanReport, AlertError> {
        let started_at = Instant::now();
        let conn = self.alerts.store().connect()?;
        let users = SqliteUserRepository::new(&conn).list_emergency_enabled()?;

        let mut report = ScanReport::default();
        for user in users {
            report.scanned += 1;
            match self.escalate_if_due(&conn, &user) {
                Ok(Escalation::NotDue) => {}
                Ok(Escalation::Sent) => report.sent += 1,
                Ok(Escalation::Failed) => report.failed += 1,
                Ok(Escalation::Skipped(reason)) => report.skip(user.id, reason),
                Err(err) => {
                    warn!(
                        "event=escalation_scan module=scanner status=item_error error={}",
                        err
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            "event=escalation_scan module=scanner status=done scanned={} sent={} failed={} skipped={} duration_ms={}",
            report.scanned,
            report.sent,
            report.failed,
            report.skipped.len(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    fn escalate_if_due(&self, conn: &Connection, user: &User) -> Result<Escalation, AlertError> {
        if user.emergency_contact.is_none() {
            return Ok(Escalation::Skipped("no emergency contact"));
        }
        let Some(latest) = SqliteCheckInRepository::new(conn).latest_check_in(user.id)? else {
            return Ok(Escalation::Skipped("never checked in"));
        };

        let now = self.alerts.clock().now();
        let days_inactive = (now - latest.checked_in_at).num_days();
        if days_inactive < self.threshold_days {
            return Ok(Escalation::NotDue);
        }

        let offset = self.alerts.offset();
        let escalated_today = SqliteAlertRepository::new(conn)
            .latest_escalation(user.id)?
            .is_some_and(|record| local_day(record.sent_at, offset) == local_day(now, offset));
        if escalated_today {
            return Ok(Escalation::Skipped("already escalated today"));
        }

        let outcome = self
            .alerts
            .send_emergency_alert(user.id, &user.display_name, days_inactive)?;
        Ok(if outcome.success {
            Escalation::Sent
        } else {
            Escalation::Failed
        })
    }
}
