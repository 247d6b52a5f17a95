//! Schema migrations for the circle store.
//!
//! # Responsibility
//! - Keep the ordered list of schema steps compiled into the binary.
//! - Bring a database file up to the newest step in one write transaction.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly one.
//! - `PRAGMA user_version` always equals the last applied step.
//! - A database written by a newer binary is refused, never downgraded.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "users_check_ins_circles_endpoints",
        sql: include_str!("0001_init.sql"),
    },
    SchemaStep {
        version: 2,
        name: "distress_alerts_escalations",
        sql: include_str!("0002_alerts.sql"),
    },
];

/// Newest schema version this binary can write.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Applies every step newer than the database's current version.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file is ahead of this binary.
/// - `Sqlite` when a step fails; the whole batch is rolled back.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = current_user_version(conn)?;
    let to_version = latest_version();
    if from_version > to_version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: to_version,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=db_migrate module=db status=applied version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;
    Ok(())
}

/// Schema version recorded in the database file.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, current_user_version, latest_version, SCHEMA_STEPS};
    use rusqlite::Connection;

    #[test]
    fn step_versions_are_contiguous() {
        for (index, step) in SCHEMA_STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1, "step {}", step.name);
        }
    }

    #[test]
    fn in_memory_database_migrates_to_latest() {
        let mut conn = Connection::open_in_memory().expect("in-memory db");
        apply_migrations(&mut conn).expect("migrations apply");
        assert_eq!(current_user_version(&conn).expect("version"), latest_version());
        apply_migrations(&mut conn).expect("second run is a no-op");
    }
}
