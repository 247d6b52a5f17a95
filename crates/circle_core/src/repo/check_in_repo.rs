//! Check-in repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Answer "latest check-in" queries ordered by time descending.
//! - Append check-ins together with the recomputed streak.
//!
//! # Invariants
//! - Check-ins are append-only.
//! - `append_check_in_with_streak` only accepts a live `Transaction`, so the
//!   streak can never be written apart from its check-in row.

use crate::model::check_in::CheckIn;
use crate::model::user::UserId;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::{parse_epoch_ms, parse_uuid};
use rusqlite::{params, Connection, Row, Transaction};

const CHECK_IN_SELECT_SQL: &str = "SELECT uuid, user_uuid, checked_in_at FROM check_ins";

/// Repository interface for check-in reads.
pub trait CheckInRepository {
    /// Most recent check-in for `user_id` (ordered read, limit 1).
    fn latest_check_in(&self, user_id: UserId) -> RepoResult<Option<CheckIn>>;
    /// Recent check-ins, newest first.
    fn list_check_ins(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<CheckIn>>;
}

/// SQLite-backed check-in repository.
///
/// Works against a plain connection or, through deref, an open transaction.
pub struct SqliteCheckInRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCheckInRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CheckInRepository for SqliteCheckInRepository<'_> {
    fn latest_check_in(&self, user_id: UserId) -> RepoResult<Option<CheckIn>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{CHECK_IN_SELECT_SQL}
             WHERE user_uuid = ?1
             ORDER BY checked_in_at DESC, rowid DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_check_in_row(row)?));
        }
        Ok(None)
    }

    fn list_check_ins(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<CheckIn>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CHECK_IN_SELECT_SQL}
             WHERE user_uuid = ?1
             ORDER BY checked_in_at DESC, rowid DESC
             LIMIT ?2;"
        ))?;
        let mut rows = stmt.query(params![user_id.to_string(), i64::from(limit)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_check_in_row(row)?);
        }
        Ok(items)
    }
}

/// Appends `check_in` and sets the owner's streak inside `tx`.
pub(crate) fn append_check_in_with_streak(
    tx: &Transaction<'_>,
    check_in: &CheckIn,
    streak: u32,
) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO check_ins (uuid, user_uuid, checked_in_at) VALUES (?1, ?2, ?3);",
        params![
            check_in.id.to_string(),
            check_in.user_id.to_string(),
            check_in.checked_in_at.timestamp_millis(),
        ],
    )?;

    let changed = tx.execute(
        "UPDATE users
         SET streak = ?1,
             updated_at = ?2
         WHERE uuid = ?3;",
        params![
            i64::from(streak),
            check_in.checked_in_at.timestamp_millis(),
            check_in.user_id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "user",
            id: check_in.user_id,
        });
    }
    Ok(())
}

fn parse_check_in_row(row: &Row<'_>) -> RepoResult<CheckIn> {
    let uuid_text: String = row.get("uuid")?;
    let user_text: String = row.get("user_uuid")?;
    Ok(CheckIn {
        id: parse_uuid(&uuid_text, "check_ins.uuid")?,
        user_id: parse_uuid(&user_text, "check_ins.user_uuid")?,
        checked_in_at: parse_epoch_ms(row.get("checked_in_at")?, "check_ins.checked_in_at")?,
    })
}
