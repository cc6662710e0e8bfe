// Integration tests for the migration framework

use rusqlite::Connection;

fn setup_test_db() -> Connection {
    Connection::open_in_memory().expect("Failed to create in-memory database")
}

fn get_table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

#[test]
fn test_apply_migrations_on_empty_db() {
    // Given: An empty SQLite database
    let mut conn = setup_test_db();

    // When: Migrations are applied
    let result = wikiledger_store::migrations::apply_migrations(&mut conn);

    // Then: All migrations succeed
    assert!(result.is_ok(), "Migrations should succeed: {:?}", result.err());

    // And: Every ledger table exists
    let tables = get_table_names(&conn);
    for expected in [
        "schema_version",
        "revisions",
        "ingest_runs",
        "entity_definitions",
        "parameter_definitions",
        "parameter_levels",
        "sqlite_sequence",
    ] {
        assert!(
            tables.contains(&expected.to_string()),
            "Missing table: {}",
            expected
        );
    }
    assert_eq!(tables.len(), 7);
}

#[test]
fn test_migrations_recorded_with_checksums() {
    let mut conn = setup_test_db();
    wikiledger_store::migrations::apply_migrations(&mut conn).unwrap();

    let mut stmt = conn
        .prepare("SELECT migration_id, checksum FROM schema_version ORDER BY migration_id")
        .unwrap();
    let rows: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    let ids: Vec<&str> = rows.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["001_revisions", "002_ingest_runs", "003_projection"]);
    assert!(rows.iter().all(|(_, checksum)| checksum.len() == 64));
}

#[test]
fn test_open_ledger_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".wikiledger").join("store.db");

    let conn = wikiledger_store::db::open_ledger(&path).unwrap();
    assert!(path.exists());

    let fk: i64 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .unwrap();
    assert_eq!(fk, 1);
    let mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
    drop(conn);

    // Reopening an existing ledger is idempotent
    assert!(wikiledger_store::db::open_ledger(&path).is_ok());
}
