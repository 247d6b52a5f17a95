use circle_core::db::migrations::{current_user_version, latest_version};
use circle_core::db::{open_db, DbError};
use circle_core::Store;
use std::time::Duration;
use tempfile::TempDir;

const BUSY: Duration = Duration::from_secs(5);

#[test]
fn fresh_database_reaches_latest_version() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("fresh.db"), BUSY).unwrap();
    let conn = store.connect().unwrap();
    assert_eq!(current_user_version(&conn).unwrap(), latest_version());

    let journal: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal.to_ascii_lowercase(), "wal");
}

#[test]
fn reopening_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reopen.db");
    drop(Store::open(&path, BUSY).unwrap());
    let store = Store::open(&path, BUSY).unwrap();
    let conn = store.connect().unwrap();
    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
}

#[test]
fn every_table_exists_after_migration() {
    let dir = TempDir::new().unwrap();
    let conn = open_db(dir.path().join("tables.db"), BUSY).unwrap();
    for table in [
        "users",
        "check_ins",
        "circles",
        "circle_members",
        "device_endpoints",
        "distress_alerts",
        "escalations",
    ] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1;",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "missing table {table}");
    }
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("future.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 99;").unwrap();
    }

    match Store::open(&path, BUSY) {
        Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }) => {
            assert_eq!(db_version, 99);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("expected unsupported schema version, got {other:?}"),
    }
}

#[test]
fn custom_hours_outside_range_violate_schema() {
    let dir = TempDir::new().unwrap();
    let conn = open_db(dir.path().join("check.db"), BUSY).unwrap();
    let result = conn.execute(
        "INSERT INTO users (uuid, display_name, cadence, custom_hours) VALUES ('u1', 'Ana', 'custom', 500);",
        [],
    );
    assert!(result.is_err());
}
