//! Engine-level write commands.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;

use rusqlite::Connection;
use wikiledger_core::model::{Revision, RowBatch, Scope};
use wikiledger_core::rebuild::RebuildReport;
use wikiledger_core::{ProjectionConfig, RunMode};
use wikiledger_store::errors::Result;

use crate::commands::ingest::{ingest_batch, IngestOutcome};
use crate::commands::manual::record_manual_revision;
use crate::commands::rebuild::rebuild_projection;

/// Commands that may write to the ledger database.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Diff one scraped batch against the revision store.
    Ingest { batch: RowBatch, mode: RunMode },
    /// Project the latest active revisions of a format version.
    Rebuild {
        format_version: String,
        config: ProjectionConfig,
        mode: RunMode,
    },
    /// Record a human-entered revision.
    RecordManual {
        scope: Scope,
        name: String,
        fields: BTreeMap<String, String>,
    },
}

/// Result of applying an engine command.
#[derive(Debug, Clone)]
pub enum EngineCommandResult {
    Ingest(IngestOutcome),
    Rebuild(RebuildReport),
    RecordManual(Revision),
}

/// Apply an engine command.
pub fn apply_engine_command(cmd: EngineCommand, conn: &mut Connection) -> Result<EngineCommandResult> {
    match cmd {
        EngineCommand::Ingest { batch, mode } => {
            ingest_batch(conn, &batch, mode).map(EngineCommandResult::Ingest)
        }
        EngineCommand::Rebuild {
            format_version,
            config,
            mode,
        } => rebuild_projection(conn, &format_version, &config, mode)
            .map(EngineCommandResult::Rebuild),
        EngineCommand::RecordManual {
            scope,
            name,
            fields,
        } => record_manual_revision(conn, &scope, &name, &fields)
            .map(EngineCommandResult::RecordManual),
    }
}
