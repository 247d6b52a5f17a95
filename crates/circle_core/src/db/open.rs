//! Store handle and per-operation connections.
//!
//! # Responsibility
//! - Migrate the database file once, when the store is opened.
//! - Give each logical operation its own configured connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - `Store::open` leaves the database in WAL mode with migrations applied.

use super::migrations::{apply_migrations, latest_version};
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Injectable handle to the transactional store.
///
/// Cheap to clone; every logical operation opens its own connection through
/// [`Store::connect`] so concurrent callers never share a `Connection`.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Store {
    /// Opens (or creates) the database file and applies pending migrations.
    ///
    /// # Side effects
    /// - Switches the database journal to WAL.
    /// - Emits `db_open` logging events with duration and status.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_db(&path, busy_timeout)?;
        drop(conn);
        Ok(Self { path, busy_timeout })
    }

    /// Opens one configured connection for a single logical operation.
    pub fn connect(&self) -> DbResult<Connection> {
        let conn = Connection::open(&self.path)?;
        configure_connection(&conn, self.busy_timeout)?;
        Ok(conn)
    }

    /// Database file location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Opens a database file, switches it to WAL and applies pending
/// migrations.
pub fn open_db(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = Connection::open(path)
        .map_err(DbError::from)
        .and_then(|mut conn| bootstrap_connection(&mut conn, busy_timeout).map(|()| conn));

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok schema_version={} duration_ms={}",
            latest_version(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error error_code={} duration_ms={} error={}",
            err.code(),
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn bootstrap_connection(conn: &mut Connection, busy_timeout: Duration) -> DbResult<()> {
    configure_connection(conn, busy_timeout)?;
    let _journal_mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    apply_migrations(conn)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}
