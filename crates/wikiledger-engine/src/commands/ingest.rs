//! Ingestion command: one batch, one transaction, one run-ledger row.

#![allow(clippy::result_large_err)]

use std::path::Path;

use rusqlite::Connection;
use wikiledger_core::ingest::{ingest, IngestSummary};
use wikiledger_core::model::{now_millis, RowBatch};
use wikiledger_core::{log_op_end, log_op_error, log_op_start, RunMode};
use wikiledger_core_types::RunId;
use wikiledger_store::errors::{from_rusqlite, io_error, Result};
use wikiledger_store::repo::record_ingest_run;
use wikiledger_store::SqliteStore;

/// Result of an ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub run_id: RunId,
    pub mode: RunMode,
    pub summary: IngestSummary,
}

/// Read a scraper batch file (JSON)
pub fn read_batch_file(path: &Path) -> Result<RowBatch> {
    let text = std::fs::read_to_string(path).map_err(|e| io_error("read_batch", e))?;
    Ok(serde_json::from_str(&text)?)
}

/// Ingest one batch.
///
/// In write mode the revisions and the run-ledger row commit together; any failure
/// rolls the whole batch back. Dry runs classify against the same store state and
/// write nothing.
///
/// ## Errors
///
/// - `InvalidBatch`: empty scope or leveled batch without a base name
/// - `ImmutableFieldChanged` / `DuplicateRevision`: store invariant violated
/// - `Persistence`: database error
pub fn ingest_batch(conn: &mut Connection, batch: &RowBatch, mode: RunMode) -> Result<IngestOutcome> {
    let run_id = RunId::new();
    log_op_start!(
        "ingest",
        run_id = %run_id,
        source_location = %batch.scope.source_location,
        section = %batch.scope.section,
        format_version = %batch.scope.format_version,
        mode = mode.as_str()
    );
    let start = std::time::Instant::now();

    let summary = ingest_impl(conn, batch, mode, &run_id).map_err(|e| {
        log_op_error!(
            "ingest",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            run_id = %run_id
        );
        e
    })?;

    log_op_end!(
        "ingest",
        duration_ms = start.elapsed().as_millis() as u64,
        run_id = %run_id,
        added = summary.added,
        changed = summary.changed,
        unchanged = summary.unchanged,
        deprecated = summary.deprecated,
        skipped = summary.skipped
    );

    Ok(IngestOutcome {
        run_id,
        mode,
        summary,
    })
}

fn ingest_impl(
    conn: &mut Connection,
    batch: &RowBatch,
    mode: RunMode,
    run_id: &RunId,
) -> Result<IngestSummary> {
    let now = now_millis();
    let tx = conn.transaction().map_err(from_rusqlite)?;

    let summary = {
        let mut store = SqliteStore::new(&tx);
        ingest(&mut store, batch, mode, now)?
    };

    if mode.is_write() {
        record_ingest_run(&tx, run_id, &batch.scope, mode, &summary, now)?;
        tx.commit().map_err(from_rusqlite)?;
    }

    Ok(summary)
}
