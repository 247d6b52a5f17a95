//! Storage bootstrap for the circle store.
//!
//! # Responsibility
//! - Hand out the injectable `Store` handle used by every component.
//! - Classify SQLite failures the check-in coordinator must retry.
//!
//! # Invariants
//! - Nothing reads or writes application rows before migrations succeed.
//! - Databases run in WAL mode so fan-out reads never wait on check-in
//!   writes.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, Store};

pub type DbResult<T> = Result<T, DbError>;

/// Storage-level failure.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was migrated by a newer binary.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// `true` for `SQLITE_BUSY` / `SQLITE_LOCKED`, the store's conflict
    /// signal.
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Sqlite(err) if is_contention(err))
    }

    /// Stable code for log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(err) if is_contention(err) => "store_contention",
            Self::Sqlite(_) => "sqlite_error",
            Self::UnsupportedSchemaVersion { .. } => "schema_too_new",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "storage error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database is at schema version {db_version}; this build supports up to {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

pub(crate) fn is_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}
