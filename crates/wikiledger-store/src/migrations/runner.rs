//! Migration runner
//!
//! Each pending migration runs in its own transaction together with its
//! `schema_version` row. Migrations applied earlier must still hash to the
//! checksum recorded when they ran.

#![allow(clippy::result_large_err)]

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::{get_migrations, Migration};
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA_VERSION_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY,
    migration_id TEXT NOT NULL UNIQUE,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL
)";

/// Bring the ledger schema up to date; returns how many migrations ran.
pub fn apply_migrations(conn: &mut Connection) -> Result<usize> {
    conn.execute_batch(SCHEMA_VERSION_DDL)
        .map_err(from_rusqlite)?;

    let mut applied = 0;
    for migration in get_migrations() {
        let checksum = compute_checksum(migration.sql);
        match recorded_checksum(conn, migration.id)? {
            Some(recorded) if recorded == checksum => {}
            Some(recorded) => return Err(checksum_mismatch(migration.id, &recorded, &checksum)),
            None => {
                run_migration(conn, &migration, &checksum)?;
                applied += 1;
            }
        }
    }

    if applied > 0 {
        tracing::debug!(applied, "Ledger schema migrated");
    }
    Ok(applied)
}

fn recorded_checksum(conn: &Connection, migration_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT checksum FROM schema_version WHERE migration_id = ?1",
        [migration_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(from_rusqlite)
}

fn run_migration(conn: &mut Connection, migration: &Migration, checksum: &str) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
        params![
            migration.id,
            chrono::Utc::now().timestamp_millis(),
            checksum
        ],
    )
    .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(migration_id = migration.id, "Migration applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_runs_every_migration() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(apply_migrations(&mut conn).unwrap(), get_migrations().len());
    }

    #[test]
    fn test_second_run_applies_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();

        assert_eq!(apply_migrations(&mut conn).unwrap(), 0);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, get_migrations().len() as i64);
    }

    #[test]
    fn test_edited_migration_is_detected() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn.execute(
            "UPDATE schema_version SET checksum = 'tampered' WHERE migration_id = '001_revisions'",
            [],
        )
        .unwrap();

        let err = apply_migrations(&mut conn).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
    }
}
