// Revision immutability at the store boundary and in the schema

use chrono::Utc;
use rusqlite::Connection;
use std::collections::BTreeMap;
use wikiledger_core::errors::LedgerError;
use wikiledger_core::hashing::content_hash;
use wikiledger_core::model::{NewRevision, Revision, Scope};
use wikiledger_core::RevisionStore;
use wikiledger_store::SqliteStore;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    wikiledger_store::migrations::apply_migrations(&mut conn).unwrap();
    conn
}

fn create(store: &mut SqliteStore<'_>) -> Revision {
    let fields = BTreeMap::from([("Effect".to_string(), "+5%".to_string())]);
    store
        .create_revision(NewRevision {
            scope: Scope::new("wiki/Perks", "perks", "v1"),
            canonical_name: "Coin Bonus".into(),
            entity_id: "coin_bonus".into(),
            content_hash: content_hash(&fields),
            fields,
            source_url: Some("wiki/Perks".into()),
            seen_at: Utc::now(),
        })
        .unwrap()
}

#[test]
fn test_update_lifecycle_rejects_content_change() {
    let conn = setup();
    let mut store = SqliteStore::new(&conn);
    let original = create(&mut store);

    let mut altered = original.clone();
    altered.fields.insert("Effect".into(), "+50%".into());
    let err = store.update_lifecycle(&altered).unwrap_err();

    assert_eq!(
        err,
        LedgerError::ImmutableFieldChanged {
            revision_id: original.id,
            field: "fields".into(),
        }
    );
    assert_eq!(store.revision(original.id).unwrap().unwrap(), original);
}

#[test]
fn test_update_lifecycle_applies_mutable_fields() {
    let conn = setup();
    let mut store = SqliteStore::new(&conn);
    let original = create(&mut store);

    let mut touched = original.clone();
    touched.last_seen_at = original.last_seen_at + chrono::Duration::minutes(5);
    touched.deprecated = true;
    store.update_lifecycle(&touched).unwrap();

    let loaded = store.revision(original.id).unwrap().unwrap();
    assert_eq!(loaded.last_seen_at, touched.last_seen_at);
    assert!(loaded.deprecated);
    assert_eq!(loaded.first_seen_at, original.first_seen_at);
}

#[test]
fn test_raw_sql_update_of_content_is_aborted() {
    let conn = setup();
    let mut store = SqliteStore::new(&conn);
    let original = create(&mut store);

    let result = conn.execute(
        "UPDATE revisions SET canonical_name = 'Coin Malus' WHERE id = ?1",
        [original.id],
    );

    let err = result.unwrap_err();
    assert!(wikiledger_store::errors::is_immutability_abort(&err));
    assert_eq!(store.revision(original.id).unwrap().unwrap(), original);
}

#[test]
fn test_raw_sql_delete_is_aborted() {
    let conn = setup();
    let mut store = SqliteStore::new(&conn);
    let original = create(&mut store);

    assert!(conn
        .execute("DELETE FROM revisions WHERE id = ?1", [original.id])
        .is_err());
    assert!(store.revision(original.id).unwrap().is_some());
}
