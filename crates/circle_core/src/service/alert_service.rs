//! Alerting workflows: reminder, circle check-in notice, not-okay alert and
//! emergency escalation.
//!
//! # Responsibility
//! - Resolve the right recipient set for each workflow and dispatch once.
//! - Turn delivery counts into a structured, human-readable result.
//!
//! # Invariants
//! - Delivery failures are counted, never propagated as errors.
//! - A distress alert is persisted only when at least one endpoint was
//!   dispatched to.
//! - SMS is tried only when the email attempt did not succeed.
//! - An escalation without the flag or a contact makes zero transport calls.

use crate::clock::{local_day, local_offset, Clock};
use crate::config::EngineConfig;
use crate::db::{DbError, Store};
use crate::model::alert::{AlertTarget, DistressAlert, EscalationRecord};
use crate::model::circle::{Circle, CircleId};
use crate::model::user::{EmergencyContact, UserId};
use crate::model::validation::{normalize_alert_message, validate_display_name, ValidationError};
use crate::notify::dispatcher::MulticastDispatcher;
use crate::notify::payload::{contact_email, contact_sms, Notification};
use crate::notify::transport::{call_with_timeout, TransportSet};
use crate::repo::alert_repo::{AlertRepository, SqliteAlertRepository};
use crate::repo::check_in_repo::{CheckInRepository, SqliteCheckInRepository};
use crate::repo::circle_repo::{CircleRepository, SqliteCircleRepository};
use crate::repo::endpoint_repo::SqliteEndpointRepository;
use crate::repo::error::RepoError;
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::service::fanout::FanoutResolver;
use crate::service::outcome::{
    BatchOutcome, ContactChannel, EscalationOutcome, NotOkayOutcome, SkippedItem, WorkflowOutcome,
};
use chrono::{FixedOffset, NaiveDate};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Workflow failures that stop the operation before any send.
#[derive(Debug)]
pub enum AlertError {
    Validation(ValidationError),
    UserNotFound(UserId),
    CircleNotFound(CircleId),
    NotCircleMember { circle_id: CircleId, user_id: UserId },
    Repo(RepoError),
}

impl Display for AlertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::CircleNotFound(id) => write!(f, "circle not found: {id}"),
            Self::NotCircleMember { circle_id, user_id } => {
                write!(f, "user {user_id} is not a member of circle {circle_id}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AlertError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AlertError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity: "user", id } => Self::UserNotFound(id),
            RepoError::NotFound {
                entity: "circle",
                id,
            } => Self::CircleNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for AlertError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for AlertError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for AlertError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

type SqliteResolver<'conn> =
    FanoutResolver<SqliteCircleRepository<'conn>, SqliteEndpointRepository<'conn>>;

fn resolver(conn: &Connection) -> SqliteResolver<'_> {
    FanoutResolver::new(
        SqliteCircleRepository::new(conn),
        SqliteEndpointRepository::new(conn),
    )
}

/// Notification workflows over the store and transports.
#[derive(Clone)]
pub struct AlertService {
    store: Store,
    transports: TransportSet,
    dispatcher: MulticastDispatcher,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    timeout: Duration,
}

impl AlertService {
    pub fn new(
        store: Store,
        transports: TransportSet,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        let timeout = config.transport_timeout();
        Self {
            store,
            dispatcher: MulticastDispatcher::new(transports.clone(), timeout),
            transports,
            clock,
            offset: local_offset(config.utc_offset_minutes),
            timeout,
        }
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Sends one reminder to `recipient_id`.
    ///
    /// No endpoints and zero successful deliveries are both unsuccessful
    /// results, not errors.
    pub fn send_reminder(
        &self,
        recipient_id: UserId,
        sender_name: &str,
        recipient_name: &str,
    ) -> Result<WorkflowOutcome, AlertError> {
        validate_display_name(sender_name)?;
        let conn = self.store.connect()?;
        self.remind(&conn, recipient_id, sender_name, recipient_name)
    }

    pub(crate) fn remind(
        &self,
        conn: &Connection,
        recipient_id: UserId,
        sender_name: &str,
        recipient_name: &str,
    ) -> Result<WorkflowOutcome, AlertError> {
        let started_at = Instant::now();
        let endpoints: Vec<_> = resolver(conn)
            .resolve_endpoints(recipient_id)?
            .into_iter()
            .collect();
        if endpoints.is_empty() {
            info!("event=reminder module=alerts status=skipped reason=no_endpoints");
            return Ok(WorkflowOutcome::new(
                false,
                format!("{recipient_name} hasn't enabled notifications yet."),
                1,
            ));
        }

        let notification = Notification::reminder(sender_name, recipient_name);
        let delivery = self.dispatcher.send(&endpoints, &notification);
        info!(
            "event=reminder module=alerts status=done success={} failure={} duration_ms={}",
            delivery.success_count,
            delivery.failure_count,
            started_at.elapsed().as_millis()
        );

        let outcome = if delivery.success_count == 0 {
            WorkflowOutcome::new(
                false,
                format!("Couldn't reach any of {recipient_name}'s devices."),
                1,
            )
        } else if delivery.failure_count > 0 {
            WorkflowOutcome::new(
                true,
                format!(
                    "Reminder sent to {recipient_name} on {} of {} devices.",
                    delivery.success_count,
                    delivery.attempted()
                ),
                1,
            )
        } else {
            WorkflowOutcome::new(true, format!("Reminder sent to {recipient_name}."), 1)
        };
        Ok(outcome.with_delivery(delivery))
    }

    /// Tells every member of the user's circles that they checked in.
    pub fn notify_circle_on_check_in(
        &self,
        user_id: UserId,
        user_name: &str,
    ) -> Result<WorkflowOutcome, AlertError> {
        let started_at = Instant::now();
        let conn = self.store.connect()?;
        let user = SqliteUserRepository::new(&conn)
            .get_user(user_id)?
            .ok_or(AlertError::UserNotFound(user_id))?;
        if !user.notify_circle_on_checkin {
            info!("event=checkin_fanout module=alerts status=skipped reason=disabled");
            return Ok(WorkflowOutcome::new(
                true,
                "Circle check-in notifications are turned off.",
                0,
            ));
        }

        let name = if user_name.trim().is_empty() {
            user.display_name.as_str()
        } else {
            user_name.trim()
        };
        let resolver = resolver(&conn);
        let members = resolver.resolve_all_circles_members(user_id)?;
        if members.is_empty() {
            info!("event=checkin_fanout module=alerts status=skipped reason=no_members");
            return Ok(WorkflowOutcome::new(true, "No circle members to notify.", 0));
        }

        let outcome = self.dispatch_to_members(
            &resolver,
            &members,
            &Notification::checked_in(name),
            "None of your circle members have notifications enabled.",
        )?;
        info!(
            "event=checkin_fanout module=alerts status=done recipients={} success={} failure={} duration_ms={}",
            outcome.recipients,
            outcome.delivery.success_count,
            outcome.delivery.failure_count,
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Raises a self-declared distress alert to one person, one circle or
    /// every circle the actor belongs to.
    pub fn send_not_okay_alert(
        &self,
        actor_id: UserId,
        actor_name: &str,
        target: AlertTarget,
        message: Option<&str>,
    ) -> Result<NotOkayOutcome, AlertError> {
        let started_at = Instant::now();
        validate_display_name(actor_name)?;
        let message = normalize_alert_message(message)?;

        let conn = self.store.connect()?;
        let resolver = resolver(&conn);
        let recipients = match target {
            AlertTarget::Person(recipient_id) => {
                SqliteUserRepository::new(&conn)
                    .get_user(recipient_id)?
                    .ok_or(AlertError::UserNotFound(recipient_id))?;
                BTreeSet::from([recipient_id])
            }
            AlertTarget::Circle(circle_id) => {
                let circle = SqliteCircleRepository::new(&conn)
                    .get_circle(circle_id)?
                    .ok_or(AlertError::CircleNotFound(circle_id))?;
                if !circle.contains(actor_id) {
                    return Err(AlertError::NotCircleMember {
                        circle_id,
                        user_id: actor_id,
                    });
                }
                resolver.resolve_circle_members(circle_id, actor_id)?
            }
            AlertTarget::AllCircles => resolver.resolve_all_circles_members(actor_id)?,
        };

        let notification = Notification::not_okay(actor_name.trim(), message.as_deref());
        let outcome = if recipients.is_empty() {
            WorkflowOutcome::new(false, "There's no one in your circles to alert yet.", 0)
        } else {
            self.dispatch_to_members(
                &resolver,
                &recipients,
                &notification,
                "No one you're alerting has notifications enabled.",
            )?
        };

        let alert_id = if outcome.delivery.attempted() > 0 {
            let alert = DistressAlert {
                id: Uuid::new_v4(),
                actor_id,
                actor_name: actor_name.trim().to_string(),
                target,
                message,
                created_at: self.clock.now(),
                resolved: false,
            };
            SqliteAlertRepository::new(&conn).insert_distress_alert(&alert)?;
            Some(alert.id)
        } else {
            None
        };

        info!(
            "event=not_okay module=alerts status=done target={} recipients={} success={} failure={} persisted={} duration_ms={}",
            target.kind_str(),
            outcome.recipients,
            outcome.delivery.success_count,
            outcome.delivery.failure_count,
            alert_id.is_some(),
            started_at.elapsed().as_millis()
        );
        Ok(NotOkayOutcome {
            success: outcome.success,
            message: outcome.message,
            recipients: outcome.recipients,
            delivery: outcome.delivery,
            alert_id,
        })
    }

    /// Escalates prolonged inactivity to the user's circles and emergency
    /// contact.
    pub fn send_emergency_alert(
        &self,
        user_id: UserId,
        user_name: &str,
        days_since_last_check_in: i64,
    ) -> Result<EscalationOutcome, AlertError> {
        let started_at = Instant::now();
        let conn = self.store.connect()?;
        let user = SqliteUserRepository::new(&conn)
            .get_user(user_id)?
            .ok_or(AlertError::UserNotFound(user_id))?;
        if !user.emergency_alert_enabled {
            info!("event=escalation module=alerts status=skipped reason=disabled");
            return Ok(EscalationOutcome::skipped(
                "Emergency alerts are not enabled for this user.",
            ));
        }
        let Some(contact) = user.emergency_contact.as_ref() else {
            info!("event=escalation module=alerts status=skipped reason=no_contact");
            return Ok(EscalationOutcome::skipped(
                "No emergency contact is configured for this user.",
            ));
        };

        let name = if user_name.trim().is_empty() {
            user.display_name.as_str()
        } else {
            user_name.trim()
        };
        let resolver = resolver(&conn);
        let members = resolver.resolve_all_circles_members(user_id)?;
        let endpoints = resolver.resolve_endpoints_for(&members)?;
        let circle_delivery = self.dispatcher.send(
            &endpoints,
            &Notification::circle_escalation(name, days_since_last_check_in),
        );
        let contact_channel = self.notify_contact(contact, name, days_since_last_check_in);
        let contact_reached = contact_channel.is_some();

        let record = EscalationRecord {
            id: Uuid::new_v4(),
            user_id,
            sent_at: self.clock.now(),
            days_inactive: days_since_last_check_in,
            circle_notified: circle_delivery.success_count,
            contact_reached,
        };
        // Sends already happened; a failed write is logged, not returned.
        if let Err(err) = SqliteAlertRepository::new(&conn).record_escalation(&record) {
            warn!(
                "event=escalation module=alerts status=error error_code=record_failed error={}",
                err
            );
        }

        let success = circle_delivery.success_count > 0 || contact_reached;
        let message = match (circle_delivery.success_count, contact_reached) {
            (0, false) => format!("Couldn't reach anyone about {name}."),
            (notified, true) => format!(
                "Alerted {notified} circle devices and {}.",
                contact.name
            ),
            (notified, false) => format!(
                "Alerted {notified} circle devices; {} could not be reached.",
                contact.name
            ),
        };
        info!(
            "event=escalation module=alerts status=done days_inactive={} circle_success={} circle_failure={} contact_reached={} duration_ms={}",
            days_since_last_check_in,
            circle_delivery.success_count,
            circle_delivery.failure_count,
            contact_reached,
            started_at.elapsed().as_millis()
        );
        Ok(EscalationOutcome {
            success,
            message,
            circle_notified: circle_delivery.success_count,
            circle_delivery,
            contact_reached,
            contact_channel,
        })
    }

    fn dispatch_to_members(
        &self,
        resolver: &SqliteResolver<'_>,
        members: &BTreeSet<UserId>,
        notification: &Notification,
        unreachable_message: &str,
    ) -> Result<WorkflowOutcome, AlertError> {
        let endpoints = resolver.resolve_endpoints_for(members)?;
        if endpoints.is_empty() {
            return Ok(WorkflowOutcome::new(
                false,
                unreachable_message,
                members.len(),
            ));
        }

        let delivery = self.dispatcher.send(&endpoints, notification);
        let success = delivery.success_count > 0;
        let message = if !success {
            "Couldn't deliver to any device.".to_string()
        } else if delivery.failure_count > 0 {
            format!(
                "Notified {} people ({} of {} devices reached).",
                members.len(),
                delivery.success_count,
                delivery.attempted()
            )
        } else {
            format!("Notified {} people.", members.len())
        };
        Ok(WorkflowOutcome::new(success, message, members.len()).with_delivery(delivery))
    }

    fn notify_contact(
        &self,
        contact: &EmergencyContact,
        user_name: &str,
        days_inactive: i64,
    ) -> Option<ContactChannel> {
        if let Some(email) = contact.email.clone() {
            match self.transports.email.clone() {
                Some(transport) => {
                    let (subject, body) = contact_email(user_name, contact, days_inactive);
                    match call_with_timeout(self.timeout, move || {
                        transport.send(&email, &subject, &body)
                    }) {
                        Ok(true) => return Some(ContactChannel::Email),
                        Ok(false) => warn!(
                            "event=escalation_contact module=alerts channel=email status=error error_code=not_delivered"
                        ),
                        Err(err) => warn!(
                            "event=escalation_contact module=alerts channel=email status=error error={}",
                            err
                        ),
                    }
                }
                None => warn!(
                    "event=escalation_contact module=alerts channel=email status=skipped error_code=email_unconfigured"
                ),
            }
        }

        if let Some(phone) = contact.phone.clone() {
            match self.transports.sms.clone() {
                Some(transport) => {
                    let message = contact_sms(user_name, days_inactive);
                    match call_with_timeout(self.timeout, move || transport.send(&phone, &message)) {
                        Ok(true) => return Some(ContactChannel::Sms),
                        Ok(false) => warn!(
                            "event=escalation_contact module=alerts channel=sms status=error error_code=not_delivered"
                        ),
                        Err(err) => warn!(
                            "event=escalation_contact module=alerts channel=sms status=error error={}",
                            err
                        ),
                    }
                }
                None => warn!(
                    "event=escalation_contact module=alerts channel=sms status=skipped error_code=sms_unconfigured"
                ),
            }
        }
        None
    }
}

impl AlertService {
    /// Reminds every member of `circle_id` who has not checked in on the
    /// current local day. The sender must belong to the circle and is never
    /// reminded.
    pub fn send_reminders_to_inactive_members(
        &self,
        circle_id: CircleId,
        sender_id: UserId,
        sender_name: &str,
    ) -> Result<BatchOutcome, AlertError> {
        validate_display_name(sender_name)?;
        let conn = self.store.connect()?;
        let circle = SqliteCircleRepository::new(&conn)
            .get_circle(circle_id)?
            .ok_or(AlertError::CircleNotFound(circle_id))?;
        if !circle.contains(sender_id) {
            return Err(AlertError::NotCircleMember {
                circle_id,
                user_id: sender_id,
            });
        }
        Ok(self.remind_inactive(&conn, &circle, Some(sender_id), sender_name.trim()))
    }

    pub(crate) fn remind_inactive(
        &self,
        conn: &Connection,
        circle: &Circle,
        exclude: Option<UserId>,
        sender_name: &str,
    ) -> BatchOutcome {
        let today = local_day(self.clock.now(), self.offset);
        let mut sent = 0_u32;
        let mut failed = 0_u32;
        let mut skipped = Vec::new();

        for member_id in circle
            .members
            .iter()
            .copied()
            .filter(|id| Some(*id) != exclude)
        {
            match self.remind_if_inactive(conn, member_id, sender_name, today) {
                Ok(MemberReminder::Active) => {}
                Ok(MemberReminder::Sent) => sent += 1,
                Ok(MemberReminder::Failed) => failed += 1,
                Ok(MemberReminder::Skipped(reason)) => skipped.push(SkippedItem {
                    subject: member_id,
                    reason,
                }),
                Err(err) => {
                    warn!(
                        "event=reminder_batch module=alerts status=item_error error={}",
                        err
                    );
                    failed += 1;
                }
            }
        }

        let message = if sent == 0 && failed == 0 && skipped.is_empty() {
            format!("Everyone in {} has checked in today.", circle.name)
        } else {
            format!(
                "Sent {sent} reminders in {} ({failed} failed, {} skipped).",
                circle.name,
                skipped.len()
            )
        };
        info!(
            "event=reminder_batch module=alerts status=done sent={} failed={} skipped={}",
            sent,
            failed,
            skipped.len()
        );
        BatchOutcome {
            success: failed == 0 || sent > 0,
            message,
            sent,
            failed,
            skipped,
        }
    }

    fn remind_if_inactive(
        &self,
        conn: &Connection,
        member_id: UserId,
        sender_name: &str,
        today: NaiveDate,
    ) -> Result<MemberReminder, AlertError> {
        let latest = SqliteCheckInRepository::new(conn).latest_check_in(member_id)?;
        if latest.is_some_and(|check_in| local_day(check_in.checked_in_at, self.offset) == today) {
            return Ok(MemberReminder::Active);
        }

        let Some(member) = SqliteUserRepository::new(conn).get_user(member_id)? else {
            return Ok(MemberReminder::Skipped("user record missing".to_string()));
        };
        let outcome = self.remind(conn, member_id, sender_name, &member.display_name)?;
        Ok(if outcome.success {
            MemberReminder::Sent
        } else if outcome.delivery.attempted() == 0 {
            MemberReminder::Skipped(outcome.message)
        } else {
            MemberReminder::Failed
        })
    }
}

enum MemberReminder {
    Active,
    Sent,
    Failed,
    Skipped(String),
}
