//! Rebuild command: project the latest active revisions of a format version.

#![allow(clippy::result_large_err)]

use rusqlite::Connection;
use wikiledger_core::rebuild::{rebuild, RebuildReport};
use wikiledger_core::{log_op_end, log_op_error, log_op_start, ProjectionConfig, RunMode};
use wikiledger_core_types::RunId;
use wikiledger_store::errors::{from_rusqlite, Result};
use wikiledger_store::SqliteStore;

/// Rebuild the projection of `format_version`.
///
/// All entities that plan cleanly are written in one transaction. Entities with
/// schema drift are listed in the report's failures and keep their previous projection.
///
/// ## Errors
///
/// - `InvalidConfig`: configuration fails validation
/// - `Persistence`: database error (nothing is written)
pub fn rebuild_projection(
    conn: &mut Connection,
    format_version: &str,
    config: &ProjectionConfig,
    mode: RunMode,
) -> Result<RebuildReport> {
    let run_id = RunId::new();
    log_op_start!(
        "rebuild",
        run_id = %run_id,
        format_version = format_version,
        mode = mode.as_str()
    );
    let start = std::time::Instant::now();

    let report = rebuild_impl(conn, format_version, config, mode).map_err(|e| {
        log_op_error!(
            "rebuild",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            run_id = %run_id
        );
        e
    })?;

    log_op_end!(
        "rebuild",
        duration_ms = start.elapsed().as_millis() as u64,
        run_id = %run_id,
        created_definitions = report.summary.created_definitions,
        updated_definitions = report.summary.updated_definitions,
        created_levels = report.summary.created_levels,
        deleted_levels = report.summary.deleted_levels,
        skipped_levels = report.summary.skipped_levels,
        failures = report.failures.len()
    );

    Ok(report)
}

fn rebuild_impl(
    conn: &mut Connection,
    format_version: &str,
    config: &ProjectionConfig,
    mode: RunMode,
) -> Result<RebuildReport> {
    config.validate()?;
    let tx = conn.transaction().map_err(from_rusqlite)?;

    let report = {
        let mut store = SqliteStore::new(&tx);
        rebuild(&mut store, format_version, config, mode)?
    };

    if mode.is_write() {
        tx.commit().map_err(from_rusqlite)?;
    }
    Ok(report)
}
