//! Ingest run ledger
//!
//! One row per applied ingestion run, written in the same transaction as the
//! revisions it describes.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use crate::repo::hydration::millis_to_datetime;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use wikiledger_core::ingest::IngestSummary;
use wikiledger_core::model::Scope;
use wikiledger_core::RunMode;
use wikiledger_core_types::RunId;

/// A recorded ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestRunRecord {
    pub run_id: String,
    pub scope: Scope,
    pub mode: String,
    pub summary: IngestSummary,
    pub recorded_at: DateTime<Utc>,
}

/// Record an ingestion run
pub fn record_ingest_run(
    conn: &Connection,
    run_id: &RunId,
    scope: &Scope,
    mode: RunMode,
    summary: &IngestSummary,
    recorded_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO ingest_runs (run_id, source_location, section, format_version, mode,
            added, changed, unchanged, deprecated, skipped, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            run_id.as_str(),
            scope.source_location,
            scope.section,
            scope.format_version,
            mode.as_str(),
            summary.added as i64,
            summary.changed as i64,
            summary.unchanged as i64,
            summary.deprecated as i64,
            summary.skipped as i64,
            recorded_at.timestamp_millis(),
        ],
    )
    .map_err(from_rusqlite)?;

    tracing::debug!(run_id = %run_id, scope = %scope, "Ingest run recorded");
    Ok(())
}

/// Runs recorded for a scope, oldest first
pub fn ingest_runs(conn: &Connection, scope: &Scope) -> Result<Vec<IngestRunRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT rowid, run_id, mode, added, changed, unchanged, deprecated, skipped, recorded_at
             FROM ingest_runs
             WHERE source_location = ?1 AND section = ?2 AND format_version = ?3
             ORDER BY recorded_at, rowid",
        )
        .map_err(from_rusqlite)?;

    type RawRun = (i64, String, String, i64, i64, i64, i64, i64, i64);
    let rows: Vec<RawRun> = stmt
        .query_map(
            params![scope.source_location, scope.section, scope.format_version],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            },
        )
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    rows.into_iter()
        .map(
            |(rowid, run_id, mode, added, changed, unchanged, deprecated, skipped, at)| {
                Ok(IngestRunRecord {
                    run_id,
                    scope: scope.clone(),
                    mode,
                    summary: IngestSummary {
                        added: added as usize,
                        changed: changed as usize,
                        unchanged: unchanged as usize,
                        deprecated: deprecated as usize,
                        skipped: skipped as usize,
                    },
                    recorded_at: millis_to_datetime("ingest_runs", rowid, at)?,
                })
            },
        )
        .collect()
}
