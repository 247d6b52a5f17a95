//! Operator CLI.
//!
//! # Responsibility
//! - Verify `circle_core` linkage with a deterministic smoke probe.
//! - Apply schema migrations to a database file on demand.

use circle_core::db::migrations::current_user_version;
use circle_core::{EngineConfig, Store};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {
            println!("circle_core ping={}", circle_core::ping());
            println!("circle_core version={}", circle_core::core_version());
            ExitCode::SUCCESS
        }
        [command, db_path] if command == "migrate" => match migrate(db_path) {
            Ok(version) => {
                println!("schema_version={version} path={db_path}");
                ExitCode::SUCCESS
            }
            Err(message) => {
                eprintln!("migrate failed: {message}");
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("usage: circle_cli [migrate <db_path>]");
            ExitCode::from(2)
        }
    }
}

fn migrate(db_path: &str) -> Result<u32, String> {
    let config = EngineConfig::default();
    let store = Store::open(db_path, config.busy_timeout()).map_err(|err| err.to_string())?;
    let conn = store.connect().map_err(|err| err.to_string())?;
    current_user_version(&conn).map_err(|err| err.to_string())
}
