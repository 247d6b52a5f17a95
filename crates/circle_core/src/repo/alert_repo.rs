//! Distress alert and escalation persistence.
//!
//! # Responsibility
//! - Write-once distress alert records.
//! - Escalation log consulted to avoid alerting twice on one calendar day.

use crate::model::alert::{AlertTarget, DistressAlert, EscalationRecord};
use crate::model::user::UserId;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::{bool_to_int, parse_epoch_ms, parse_flag, parse_uuid};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

/// Repository interface for alert records.
pub trait AlertRepository {
    fn insert_distress_alert(&self, alert: &DistressAlert) -> RepoResult<()>;
    /// Alerts raised by `actor_id`, newest first.
    fn list_alerts_for_actor(&self, actor_id: UserId) -> RepoResult<Vec<DistressAlert>>;
    fn record_escalation(&self, record: &EscalationRecord) -> RepoResult<()>;
    /// Most recent escalation for `user_id`.
    fn latest_escalation(&self, user_id: UserId) -> RepoResult<Option<EscalationRecord>>;
}

/// SQLite-backed alert repository.
pub struct SqliteAlertRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAlertRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AlertRepository for SqliteAlertRepository<'_> {
    fn insert_distress_alert(&self, alert: &DistressAlert) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO distress_alerts (
                uuid,
                actor_uuid,
                actor_name,
                target_kind,
                target_uuid,
                message,
                created_at,
                resolved
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                alert.id.to_string(),
                alert.actor_id.to_string(),
                alert.actor_name.as_str(),
                alert.target.kind_str(),
                alert.target.target_id().map(|id| id.to_string()),
                alert.message.as_deref(),
                alert.created_at.timestamp_millis(),
                bool_to_int(alert.resolved),
            ],
        )?;
        Ok(())
    }

    fn list_alerts_for_actor(&self, actor_id: UserId) -> RepoResult<Vec<DistressAlert>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, actor_uuid, actor_name, target_kind, target_uuid, message, created_at, resolved
             FROM distress_alerts
             WHERE actor_uuid = ?1
             ORDER BY created_at DESC, rowid DESC;",
        )?;
        let mut rows = stmt.query([actor_id.to_string()])?;
        let mut alerts = Vec::new();
        while let Some(row) = rows.next()? {
            alerts.push(parse_alert_row(row)?);
        }
        Ok(alerts)
    }

    fn record_escalation(&self, record: &EscalationRecord) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO escalations (
                uuid,
                user_uuid,
                sent_at,
                days_inactive,
                circle_notified,
                contact_reached
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                record.id.to_string(),
                record.user_id.to_string(),
                record.sent_at.timestamp_millis(),
                record.days_inactive,
                i64::from(record.circle_notified),
                bool_to_int(record.contact_reached),
            ],
        )?;
        Ok(())
    }

    fn latest_escalation(&self, user_id: UserId) -> RepoResult<Option<EscalationRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT uuid, user_uuid, sent_at, days_inactive, circle_notified, contact_reached
             FROM escalations
             WHERE user_uuid = ?1
             ORDER BY sent_at DESC, rowid DESC
             LIMIT 1;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let uuid_text: String = row.get("uuid")?;
        let user_text: String = row.get("user_uuid")?;
        let circle_notified = row.get::<_, i64>("circle_notified")?;
        Ok(Some(EscalationRecord {
            id: parse_uuid(&uuid_text, "escalations.uuid")?,
            user_id: parse_uuid(&user_text, "escalations.user_uuid")?,
            sent_at: parse_epoch_ms(row.get("sent_at")?, "escalations.sent_at")?,
            days_inactive: row.get("days_inactive")?,
            circle_notified: u32::try_from(circle_notified).map_err(|_| {
                RepoError::InvalidData(format!(
                    "invalid count `{circle_notified}` in escalations.circle_notified"
                ))
            })?,
            contact_reached: parse_flag(
                row.get("contact_reached")?,
                "escalations.contact_reached",
            )?,
        }))
    }
}

fn parse_alert_row(row: &Row<'_>) -> RepoResult<DistressAlert> {
    let uuid_text: String = row.get("uuid")?;
    let actor_text: String = row.get("actor_uuid")?;
    let kind: String = row.get("target_kind")?;
    let target_text: Option<String> = row.get("target_uuid")?;
    let target_id = target_text
        .map(|text| parse_uuid(&text, "distress_alerts.target_uuid"))
        .transpose()?;

    let target = match (kind.as_str(), target_id) {
        ("person", Some(id)) => AlertTarget::Person(id),
        ("circle", Some(id)) => AlertTarget::Circle(id),
        ("all_circles", None) => AlertTarget::AllCircles,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "inconsistent target `{kind}` in distress_alerts.target_kind"
            )));
        }
    };

    let created_at: DateTime<Utc> =
        parse_epoch_ms(row.get("created_at")?, "distress_alerts.created_at")?;
    Ok(DistressAlert {
        id: parse_uuid(&uuid_text, "distress_alerts.uuid")?,
        actor_id: parse_uuid(&actor_text, "distress_alerts.actor_uuid")?,
        actor_name: row.get("actor_name")?,
        target,
        message: row.get("message")?,
        created_at,
        resolved: parse_flag(row.get("resolved")?, "distress_alerts.resolved")?,
    })
}
