// Ingestion and rebuild commands against an on-disk ledger.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use rusqlite::Connection;
use tempfile::TempDir;
use wikiledger_core::errors::LedgerError;
use wikiledger_core::ingest::IngestSummary;
use wikiledger_core::logging_facility::test_capture::init_test_capture;
use wikiledger_core::{Leveling, ProjectionConfig, ProjectionStore, RawRow, RowBatch, RunMode, Scope};
use wikiledger_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use wikiledger_engine::commands::ingest::{ingest_batch, read_batch_file};
use wikiledger_engine::commands::rebuild::rebuild_projection;
use wikiledger_engine::{apply_engine_command, EngineCommand, EngineCommandResult};
use wikiledger_store::repo::ingest_runs;
use wikiledger_store::SqliteStore;

const CONFIG: &str = r#"
[entity_types.ultimate_weapon]
sections = ["death_wave"]
expected_parameter_count = 1
cost_field = "Cost"
currency = "stones"
[entity_types.ultimate_weapon.parameters]
"Damage" = { key = "damage", unit = "multiplier" }

[entity_types.perk]
sections = ["perks"]
expected_parameter_count = 1
[entity_types.perk.parameters]
"Effect" = { key = "effect", unit = "percent" }
"#;

fn setup_db() -> (TempDir, Connection) {
    let temp_dir = TempDir::new().unwrap();
    let conn = wikiledger_store::db::open_ledger(temp_dir.path().join("ledger.db")).unwrap();
    (temp_dir, conn)
}

fn perks_scope() -> Scope {
    Scope::new("wiki/Perks", "perks", "v1")
}

fn perks(rows: &[(&str, &str)]) -> RowBatch {
    RowBatch::new(
        perks_scope(),
        rows.iter()
            .map(|(name, effect)| RawRow::from_pairs([("Name", *name), ("Effect", *effect)]))
            .collect(),
    )
}

fn revision_count(conn: &Connection) -> usize {
    SqliteStore::new(conn).revision_count(&perks_scope()).unwrap()
}

#[test]
fn test_write_ingest_persists_revisions_and_run_row() {
    let (_tmp, mut conn) = setup_db();

    let outcome = ingest_batch(
        &mut conn,
        &perks(&[("Coin Bonus", "+5%"), ("Attack Speed", "+3%")]),
        RunMode::Write,
    )
    .unwrap();

    assert_eq!(outcome.summary.added, 2);
    assert_eq!(revision_count(&conn), 2);
    let runs = ingest_runs(&conn, &perks_scope()).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, outcome.run_id.as_str());
    assert_eq!(runs[0].mode, "write");
    assert_eq!(runs[0].summary, outcome.summary);
}

#[test]
fn test_dry_run_ingest_matches_write_and_leaves_no_trace() {
    let (_tmp, mut conn) = setup_db();
    ingest_batch(&mut conn, &perks(&[("Coin Bonus", "+5%")]), RunMode::Write).unwrap();

    let next = perks(&[("Coin Bonus", "+6%"), ("Damage", "+2%")]);
    let dry = ingest_batch(&mut conn, &next, RunMode::DryRun).unwrap();

    assert_eq!(revision_count(&conn), 1);
    assert_eq!(ingest_runs(&conn, &perks_scope()).unwrap().len(), 1);

    let wet = ingest_batch(&mut conn, &next, RunMode::Write).unwrap();
    assert_eq!(dry.summary, wet.summary);
    assert_eq!(
        wet.summary,
        IngestSummary {
            added: 1,
            changed: 1,
            unchanged: 0,
            deprecated: 0,
            skipped: 0,
        }
    );
    assert_eq!(revision_count(&conn), 3);
}

#[test]
fn test_rejected_batch_writes_nothing_and_logs_error() {
    let capture = init_test_capture();
    let (_tmp, mut conn) = setup_db();
    let batch = RowBatch::leveled(
        Scope::new("wiki/Ultimate_Weapons", "death_wave", "v1"),
        Leveling {
            base_name: "-".into(),
            variant: None,
            level_field: None,
        },
        vec![RawRow::from_pairs([("Damage", "x2")])],
    );

    let err = ingest_batch(&mut conn, &batch, RunMode::Write).unwrap_err();

    assert!(matches!(err, LedgerError::InvalidBatch { .. }));
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM revisions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);
    let runs: i64 = conn
        .query_row("SELECT COUNT(*) FROM ingest_runs", [], |r| r.get(0))
        .unwrap();
    assert_eq!(runs, 0);
    let errors = capture.count_events(|e| {
        e.op.as_deref() == Some("ingest")
            && e.event.as_deref() == Some(EVENT_END_ERROR)
            && e.field("err_code") == Some("ERR_INVALID_INPUT")
    });
    assert!(errors >= 1);
}

#[test]
fn test_ingest_logs_start_and_end_with_run_id() {
    let capture = init_test_capture();
    let (_tmp, mut conn) = setup_db();

    let outcome =
        ingest_batch(&mut conn, &perks(&[("Coin Bonus", "+5%")]), RunMode::Write).unwrap();

    let events: Vec<_> = capture
        .events_for_op("ingest")
        .into_iter()
        .filter(|e| e.field("run_id") == Some(outcome.run_id.as_str()))
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(events[1].event.as_deref(), Some(EVENT_END));
    assert_eq!(events[1].field("added"), Some("1"));
}

#[test]
fn test_read_batch_file_parses_scraper_json() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("batch.json");
    std::fs::write(
        &path,
        r#"{
            "source_location": "wiki/Perks",
            "section": "perks",
            "format_version": "v1",
            "rows": [
                { "fields": { "Name": "Coin Bonus", "Effect": "+5%" } },
                { "name": "Attack Speed", "fields": { "Effect": "+3%" } }
            ]
        }"#,
    )
    .unwrap();

    let batch = read_batch_file(&path).unwrap();

    assert_eq!(batch.scope, perks_scope());
    assert_eq!(batch.rows.len(), 2);
    assert_eq!(batch.rows[1].name_hint(), "Attack Speed");
}

#[test]
fn test_read_batch_file_reports_missing_and_malformed_files() {
    let tmp = TempDir::new().unwrap();
    let missing = read_batch_file(&tmp.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, LedgerError::Io { .. }));

    let bad = tmp.path().join("bad.json");
    std::fs::write(&bad, "{ not json").unwrap();
    let malformed = read_batch_file(&bad).unwrap_err();
    assert!(matches!(malformed, LedgerError::Serialization { .. }));
}

#[test]
fn test_rebuild_commits_clean_entities_and_reports_drift() {
    let (_tmp, mut conn) = setup_db();
    let batch = RowBatch::new(
        perks_scope(),
        vec![
            RawRow::from_pairs([("Name", "Coin Bonus"), ("Effect", "+5%")]),
            RawRow::from_pairs([("Name", "Crit Chance"), ("Effect", "+1%"), ("Max", "10")]),
        ],
    );
    ingest_batch(&mut conn, &batch, RunMode::Write).unwrap();
    let config = ProjectionConfig::from_toml_str(CONFIG).unwrap();

    let report = rebuild_projection(&mut conn, "v1", &config, RunMode::Write).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].entity, "crit_chance");
    let store = SqliteStore::new(&conn);
    assert!(store.entity_definition("coin_bonus").unwrap().is_some());
    assert!(store.entity_definition("crit_chance").unwrap().is_none());
}

#[test]
fn test_dry_run_rebuild_leaves_projection_empty() {
    let (_tmp, mut conn) = setup_db();
    ingest_batch(&mut conn, &perks(&[("Coin Bonus", "+5%")]), RunMode::Write).unwrap();
    let config = ProjectionConfig::from_toml_str(CONFIG).unwrap();

    let dry = rebuild_projection(&mut conn, "v1", &config, RunMode::DryRun).unwrap();
    assert!(SqliteStore::new(&conn).entity_definitions().unwrap().is_empty());

    let wet = rebuild_projection(&mut conn, "v1", &config, RunMode::Write).unwrap();
    assert_eq!(dry, wet);
    assert_eq!(wet.summary.created_definitions, 2);
    assert_eq!(wet.summary.created_levels, 1);
}

#[test]
fn test_engine_command_dispatches_ingest() {
    let (_tmp, mut conn) = setup_db();

    let result = apply_engine_command(
        EngineCommand::Ingest {
            batch: perks(&[("Coin Bonus", "+5%")]),
            mode: RunMode::Write,
        },
        &mut conn,
    )
    .unwrap();

    match result {
        EngineCommandResult::Ingest(outcome) => assert_eq!(outcome.summary.added, 1),
        other => panic!("expected ingest result, got {other:?}"),
    }
}
