//! Board schema migrations.
//!
//! # Responsibility
//! - v1 creates `engrams` with non-negative vote counters.
//! - v2 creates `votes`, the per-device ledger rows behind those counters.
//!
//! # Invariants
//! - `votes` is created after `engrams` because each vote row references its
//!   engram with `ON DELETE CASCADE`.
//! - `votes` allows one row per `(engram_id, device_id)`; the vote rule
//!   relies on this to find the prior direction.
//! - The applied version is mirrored to `PRAGMA user_version`, which
//!   `SqliteEngramRepository::try_new` checks before serving requests.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "engrams",
        sql: include_str!("0001_engrams.sql"),
    },
    Migration {
        version: 2,
        name: "votes",
        sql: include_str!("0002_votes.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current_version)
    {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
