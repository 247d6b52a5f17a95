//! Device endpoint registry.
//!
//! # Invariants
//! - A token is registered to at most one user; re-registration moves it.

use crate::model::endpoint::{Channel, DeviceEndpoint};
use crate::model::user::UserId;
use crate::model::validation::ValidationError;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::parse_uuid;
use rusqlite::{params, Connection};

/// Repository interface for delivery endpoints.
pub trait EndpointRepository {
    fn register_endpoint(&self, endpoint: &DeviceEndpoint) -> RepoResult<()>;
    /// Removes one token. Returns `false` when it was not registered.
    fn remove_endpoint(&self, token: &str) -> RepoResult<bool>;
    fn list_endpoints(&self, user_id: UserId) -> RepoResult<Vec<DeviceEndpoint>>;
}

/// SQLite-backed endpoint repository.
pub struct SqliteEndpointRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEndpointRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EndpointRepository for SqliteEndpointRepository<'_> {
    fn register_endpoint(&self, endpoint: &DeviceEndpoint) -> RepoResult<()> {
        let token = endpoint.token.trim();
        if token.is_empty() {
            return Err(ValidationError::EmptyEndpointToken.into());
        }
        self.conn.execute(
            "INSERT INTO device_endpoints (token, user_uuid, channel)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (token) DO UPDATE SET
                user_uuid = excluded.user_uuid,
                channel = excluded.channel;",
            params![token, endpoint.user_id.to_string(), endpoint.channel.as_str()],
        )?;
        Ok(())
    }

    fn remove_endpoint(&self, token: &str) -> RepoResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM device_endpoints WHERE token = ?1;", [token])?;
        Ok(removed > 0)
    }

    fn list_endpoints(&self, user_id: UserId) -> RepoResult<Vec<DeviceEndpoint>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT token, user_uuid, channel
             FROM device_endpoints
             WHERE user_uuid = ?1
             ORDER BY token ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut endpoints = Vec::new();
        while let Some(row) = rows.next()? {
            let user_text: String = row.get("user_uuid")?;
            let channel_text: String = row.get("channel")?;
            let channel = Channel::parse(&channel_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid channel `{channel_text}` in device_endpoints.channel"
                ))
            })?;
            endpoints.push(DeviceEndpoint {
                token: row.get("token")?,
                user_id: parse_uuid(&user_text, "device_endpoints.user_uuid")?,
                channel,
            });
        }
        Ok(endpoints)
    }
}
