#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{perks_batch, t};
use wikiledger_core::errors::LedgerError;
use wikiledger_core::logging_facility::test_capture::init_test_capture;
use wikiledger_core::{ingest, log_op_end, log_op_error, log_op_start, MemoryStore, RunMode};
use wikiledger_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_start_and_end_events_are_captured() {
    let capture = init_test_capture();
    let op = "logging_start_end_unique_1";

    log_op_start!(op, entity_id = "coin_bonus");
    log_op_end!(op, duration_ms = 42, added = 2usize);

    capture.assert_event_exists(op, EVENT_START);
    let end = capture
        .events_for_op(op)
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END))
        .unwrap();
    assert_eq!(end.field("duration_ms"), Some("42"));
    assert_eq!(end.field("added"), Some("2"));
}

#[test]
fn test_error_event_carries_stable_code() {
    let capture = init_test_capture();
    let op = "logging_error_unique_2";

    let err = LedgerError::RevisionNotFound { revision_id: 7 };
    log_op_error!(op, err, duration_ms = 3);

    let errors: Vec<_> = capture
        .events_for_op(op)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field("err_code"), Some("ERR_NOT_FOUND"));
    assert_eq!(errors[0].level, tracing::Level::ERROR);
}

#[test]
fn test_placeholder_rows_are_logged_at_debug() {
    let capture = init_test_capture();
    let mut store = MemoryStore::new();

    ingest(
        &mut store,
        &perks_batch(&[("Coin Bonus", "+5%"), ("n/a", "?")]),
        RunMode::DryRun,
        t(0),
    )
    .unwrap();

    let skipped = capture.count_events(|e| {
        e.level == tracing::Level::DEBUG
            && e.field("message") == Some("Skipping placeholder row")
            && e.field("name") == Some("n/a")
    });
    assert!(skipped >= 1);
}
