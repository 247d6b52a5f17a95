//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist signup records and owner-editable settings.
//! - Enumerate users eligible for inactivity escalation.
//!
//! # Invariants
//! - `create_user` always stores a zero streak.
//! - `update_settings` never touches `streak`.

use crate::model::user::{Cadence, EmergencyContact, User, UserId, UserSettings};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::{bool_to_int, parse_flag, parse_uuid};
use rusqlite::{params, Connection, Row};

const USER_SELECT_SQL: &str = "SELECT
    uuid,
    display_name,
    cadence,
    custom_hours,
    streak,
    notify_circle_on_checkin,
    emergency_alert_enabled,
    contact_name,
    contact_email,
    contact_phone,
    contact_relationship
FROM users";

/// Repository interface for user records.
pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn update_settings(&self, id: UserId, settings: &UserSettings) -> RepoResult<()>;
    /// Users with the emergency-alert flag on, in stable id order.
    fn list_emergency_enabled(&self) -> RepoResult<Vec<User>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        user.validate()?;
        let contact = user.emergency_contact.as_ref();

        self.conn.execute(
            "INSERT INTO users (
                uuid,
                display_name,
                cadence,
                custom_hours,
                streak,
                notify_circle_on_checkin,
                emergency_alert_enabled,
                contact_name,
                contact_email,
                contact_phone,
                contact_relationship
            ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                user.id.to_string(),
                user.display_name.trim(),
                user.cadence.as_str(),
                user.custom_hours,
                bool_to_int(user.notify_circle_on_checkin),
                bool_to_int(user.emergency_alert_enabled),
                contact.map(|c| c.name.as_str()),
                contact.and_then(|c| c.email.as_deref()),
                contact.and_then(|c| c.phone.as_deref()),
                contact.and_then(|c| c.relationship.as_deref()),
            ],
        )?;

        Ok(user.id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{USER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn update_settings(&self, id: UserId, settings: &UserSettings) -> RepoResult<()> {
        settings.validate()?;
        let contact = settings.emergency_contact.as_ref();

        let changed = self.conn.execute(
            "UPDATE users
             SET
                display_name = ?1,
                cadence = ?2,
                custom_hours = ?3,
                notify_circle_on_checkin = ?4,
                emergency_alert_enabled = ?5,
                contact_name = ?6,
                contact_email = ?7,
                contact_phone = ?8,
                contact_relationship = ?9,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?10;",
            params![
                settings.display_name.trim(),
                settings.cadence.as_str(),
                settings.custom_hours,
                bool_to_int(settings.notify_circle_on_checkin),
                bool_to_int(settings.emergency_alert_enabled),
                contact.map(|c| c.name.as_str()),
                contact.and_then(|c| c.email.as_deref()),
                contact.and_then(|c| c.phone.as_deref()),
                contact.and_then(|c| c.relationship.as_deref()),
                id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }
        Ok(())
    }

    fn list_emergency_enabled(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL}
             WHERE emergency_alert_enabled = 1
             ORDER BY uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "users.uuid")?;

    let cadence_text: String = row.get("cadence")?;
    let cadence = Cadence::parse(&cadence_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid cadence `{cadence_text}` in users.cadence"))
    })?;

    let streak = row.get::<_, i64>("streak")?;
    let streak = u32::try_from(streak).map_err(|_| {
        RepoError::InvalidData(format!("invalid streak `{streak}` in users.streak"))
    })?;

    let emergency_contact = row
        .get::<_, Option<String>>("contact_name")?
        .map(|name| -> RepoResult<EmergencyContact> {
            Ok(EmergencyContact {
                name,
                email: row.get("contact_email")?,
                phone: row.get("contact_phone")?,
                relationship: row.get("contact_relationship")?,
            })
        })
        .transpose()?;

    Ok(User {
        id,
        display_name: row.get("display_name")?,
        cadence,
        custom_hours: row.get("custom_hours")?,
        streak,
        notify_circle_on_checkin: parse_flag(
            row.get("notify_circle_on_checkin")?,
            "users.notify_circle_on_checkin",
        )?,
        emergency_alert_enabled: parse_flag(
            row.get("emergency_alert_enabled")?,
            "users.emergency_alert_enabled",
        )?,
        emergency_contact,
    })
}
