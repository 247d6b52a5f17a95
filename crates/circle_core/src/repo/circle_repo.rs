//! Circle repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist circles and their membership sets.
//! - Provide membership lookups for fan-out resolution.
//!
//! # Invariants
//! - A user appears at most once per circle.
//! - Member listing is deterministic: join order (`seq ASC`).
//! - The owner is the first member of a newly created circle.

use crate::model::circle::{Circle, CircleId};
use crate::model::user::UserId;
use crate::model::validation::validate_display_name;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::parse_uuid;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use uuid::Uuid;

/// Repository interface for circles and membership.
pub trait CircleRepository {
    fn create_circle(&self, name: &str, owner_id: UserId) -> RepoResult<Circle>;
    /// Adds a member. Returns `false` when the user was already a member.
    fn add_member(&self, circle_id: CircleId, user_id: UserId) -> RepoResult<bool>;
    /// Removes a member. Returns `false` when the user was not a member.
    fn remove_member(&self, circle_id: CircleId, user_id: UserId) -> RepoResult<bool>;
    fn get_circle(&self, circle_id: CircleId) -> RepoResult<Option<Circle>>;
    /// All circles in creation order.
    fn list_circles(&self) -> RepoResult<Vec<Circle>>;
    /// Circles `user_id` belongs to, in creation order.
    fn list_circles_for_user(&self, user_id: UserId) -> RepoResult<Vec<Circle>>;
}

/// SQLite-backed circle repository.
pub struct SqliteCircleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCircleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CircleRepository for SqliteCircleRepository<'_> {
    fn create_circle(&self, name: &str, owner_id: UserId) -> RepoResult<Circle> {
        validate_display_name(name)?;
        let circle_id = Uuid::new_v4();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !user_exists(&tx, owner_id)? {
            return Err(RepoError::NotFound {
                entity: "user",
                id: owner_id,
            });
        }
        tx.execute(
            "INSERT INTO circles (uuid, name, owner_uuid) VALUES (?1, ?2, ?3);",
            params![circle_id.to_string(), name.trim(), owner_id.to_string()],
        )?;
        tx.execute(
            "INSERT INTO circle_members (circle_uuid, user_uuid) VALUES (?1, ?2);",
            params![circle_id.to_string(), owner_id.to_string()],
        )?;
        tx.commit()?;

        Ok(Circle {
            id: circle_id,
            name: name.trim().to_string(),
            owner_id,
            members: vec![owner_id],
        })
    }

    fn add_member(&self, circle_id: CircleId, user_id: UserId) -> RepoResult<bool> {
        if !circle_exists(self.conn, circle_id)? {
            return Err(RepoError::NotFound {
                entity: "circle",
                id: circle_id,
            });
        }
        if !user_exists(self.conn, user_id)? {
            return Err(RepoError::NotFound {
                entity: "user",
                id: user_id,
            });
        }
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO circle_members (circle_uuid, user_uuid) VALUES (?1, ?2);",
            params![circle_id.to_string(), user_id.to_string()],
        )?;
        Ok(inserted > 0)
    }

    fn remove_member(&self, circle_id: CircleId, user_id: UserId) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM circle_members WHERE circle_uuid = ?1 AND user_uuid = ?2;",
            params![circle_id.to_string(), user_id.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn get_circle(&self, circle_id: CircleId) -> RepoResult<Option<Circle>> {
        let header = self
            .conn
            .query_row(
                "SELECT name, owner_uuid FROM circles WHERE uuid = ?1;",
                [circle_id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((name, owner_text)) = header else {
            return Ok(None);
        };

        Ok(Some(Circle {
            id: circle_id,
            name,
            owner_id: parse_uuid(&owner_text, "circles.owner_uuid")?,
            members: load_members(self.conn, circle_id)?,
        }))
    }

    fn list_circles(&self) -> RepoResult<Vec<Circle>> {
        let ids = collect_circle_ids(
            self.conn,
            "SELECT uuid FROM circles ORDER BY rowid ASC;",
            None,
        )?;
        self.load_all(ids)
    }

    fn list_circles_for_user(&self, user_id: UserId) -> RepoResult<Vec<Circle>> {
        let ids = collect_circle_ids(
            self.conn,
            "SELECT c.uuid
             FROM circles c
             JOIN circle_members m ON m.circle_uuid = c.uuid
             WHERE m.user_uuid = ?1
             ORDER BY c.rowid ASC;",
            Some(user_id),
        )?;
        self.load_all(ids)
    }
}

impl SqliteCircleRepository<'_> {
    fn load_all(&self, ids: Vec<CircleId>) -> RepoResult<Vec<Circle>> {
        let mut circles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(circle) = self.get_circle(id)? {
                circles.push(circle);
            }
        }
        Ok(circles)
    }
}

fn collect_circle_ids(
    conn: &Connection,
    sql: &str,
    user_id: Option<UserId>,
) -> RepoResult<Vec<CircleId>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = match user_id {
        Some(user_id) => stmt.query([user_id.to_string()])?,
        None => stmt.query([])?,
    };
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        ids.push(parse_uuid(&text, "circles.uuid")?);
    }
    Ok(ids)
}

fn load_members(conn: &Connection, circle_id: CircleId) -> RepoResult<Vec<UserId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT user_uuid
         FROM circle_members
         WHERE circle_uuid = ?1
         ORDER BY seq ASC;",
    )?;
    let mut rows = stmt.query([circle_id.to_string()])?;
    let mut members = Vec::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        members.push(parse_uuid(&text, "circle_members.user_uuid")?);
    }
    Ok(members)
}

fn circle_exists(conn: &Connection, circle_id: CircleId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM circles WHERE uuid = ?1);",
        [circle_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn user_exists(conn: &Connection, user_id: UserId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE uuid = ?1);",
        [user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
