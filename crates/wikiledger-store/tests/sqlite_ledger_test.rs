// The core ingestion and rebuild pipelines running against SQLite

use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::Connection;
use wikiledger_core::ingest::IngestSummary;
use wikiledger_core::{
    ingest, rebuild, Leveling, MemoryStore, ProjectionConfig, ProjectionStore, RawRow,
    RevisionStore, RowBatch, RunMode, Scope,
};
use wikiledger_core_types::RunId;
use wikiledger_store::repo::{ingest_runs, record_ingest_run};
use wikiledger_store::SqliteStore;

const CONFIG: &str = r#"
[entity_types.ultimate_weapon]
sections = ["death_wave"]
expected_parameter_count = 1
cost_field = "Cost"
currency = "stones"
[entity_types.ultimate_weapon.parameters]
"Damage" = { key = "damage", unit = "multiplier" }
"#;

fn t(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(offset)
}

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    wikiledger_store::migrations::apply_migrations(&mut conn).unwrap();
    conn
}

fn death_wave(damages: &[&str]) -> RowBatch {
    RowBatch::leveled(
        Scope::new("wiki/Ultimate_Weapons", "death_wave", "v1"),
        Leveling {
            base_name: "Death Wave".into(),
            variant: None,
            level_field: None,
        },
        damages
            .iter()
            .map(|d| RawRow::from_pairs([("Damage", *d), ("Cost", "10")]))
            .collect(),
    )
}

#[test]
fn test_sqlite_matches_memory_store_classification() {
    let conn = setup();
    let mut sqlite = SqliteStore::new(&conn);
    let mut memory = MemoryStore::new();

    let runs = [
        (death_wave(&["x2", "x3", "x4"]), t(0)),
        (death_wave(&["x2", "x3", "x4"]), t(10)),
        (death_wave(&["x2", "x5"]), t(20)),
        (death_wave(&["x2", "x3", "x4"]), t(30)),
    ];
    for (batch, at) in &runs {
        let a = ingest(&mut sqlite, batch, RunMode::Write, *at).unwrap();
        let b = ingest(&mut memory, batch, RunMode::Write, *at).unwrap();
        assert_eq!(a, b);
    }

    let scope = Scope::new("wiki/Ultimate_Weapons", "death_wave", "v1");
    assert_eq!(sqlite.revision_count(&scope).unwrap(), memory.all_revisions().len());
    assert_eq!(
        sqlite.latest_active_revisions("v1").unwrap(),
        memory.latest_active_revisions("v1").unwrap()
    );
}

#[test]
fn test_failed_batch_rolls_back() {
    let mut conn = setup();
    let tx = conn.transaction().unwrap();
    {
        let mut store = SqliteStore::new(&tx);
        ingest(&mut store, &death_wave(&["x2", "x3"]), RunMode::Write, t(0)).unwrap();
    }
    drop(tx);

    let store = SqliteStore::new(&conn);
    let scope = Scope::new("wiki/Ultimate_Weapons", "death_wave", "v1");
    assert_eq!(store.revision_count(&scope).unwrap(), 0);
}

#[test]
fn test_rebuild_round_trips_through_sqlite() {
    let conn = setup();
    let mut store = SqliteStore::new(&conn);
    ingest(&mut store, &death_wave(&["x2", "x3", "x4"]), RunMode::Write, t(0)).unwrap();
    let config = ProjectionConfig::from_toml_str(CONFIG).unwrap();

    let first = rebuild(&mut store, "v1", &config, RunMode::Write).unwrap();
    let second = rebuild(&mut store, "v1", &config, RunMode::Write).unwrap();

    assert!(first.is_clean());
    assert_eq!(first.summary.created_definitions, 2);
    assert_eq!(second.summary.created_definitions, 0);
    assert_eq!(second.summary.deleted_levels, 3);

    let weapon = store.entity_definition("death_wave").unwrap().unwrap();
    let damage = store.parameter_definition(weapon.id, "damage").unwrap().unwrap();
    let levels = store.parameter_levels(damage.id).unwrap();
    let values: Vec<(u32, f64)> = levels.iter().map(|l| (l.level, l.value)).collect();
    assert_eq!(values, vec![(1, 2.0), (2, 3.0), (3, 4.0)]);
}

#[test]
fn test_run_ledger_records_and_lists() {
    let conn = setup();
    let scope = Scope::new("wiki/Perks", "perks", "v1");
    let summary = IngestSummary {
        added: 2,
        changed: 1,
        unchanged: 4,
        deprecated: 0,
        skipped: 1,
    };
    let run_id = RunId::new();

    record_ingest_run(&conn, &run_id, &scope, RunMode::Write, &summary, t(0)).unwrap();

    let runs = ingest_runs(&conn, &scope).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, run_id.as_str());
    assert_eq!(runs[0].summary, summary);
    assert_eq!(runs[0].mode, "write");
    assert_eq!(runs[0].recorded_at, t(0));
}
