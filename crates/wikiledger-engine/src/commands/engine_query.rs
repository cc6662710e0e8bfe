//! Engine-level read-only query surface.
//!
//! `apply_engine_query` takes a shared connection and never writes.

#![allow(clippy::result_large_err)]

use rusqlite::Connection;
use wikiledger_core::model::{Revision, Scope};
use wikiledger_core::selection::SelectionPolicy;
use wikiledger_store::errors::Result;
use wikiledger_store::repo::ingest_runs;
use wikiledger_store::IngestRunRecord;

use crate::commands::select::{entity_history, select_revision};

/// Read-only queries supported by the engine.
#[derive(Debug, Clone)]
pub enum EngineQuery {
    /// Revision of one entity under a selection policy.
    Select {
        scope: Scope,
        entity_id: String,
        policy: SelectionPolicy,
    },
    /// Full revision history of one entity.
    History { scope: Scope, entity_id: String },
    /// Applied ingestion runs of a scope, oldest first.
    IngestRuns { scope: Scope },
}

/// Result of an engine query.
#[derive(Debug, Clone)]
pub enum EngineQueryResult {
    Select(Option<Revision>),
    History(Vec<Revision>),
    IngestRuns(Vec<IngestRunRecord>),
}

/// Apply a read-only query.
pub fn apply_engine_query(query: EngineQuery, conn: &Connection) -> Result<EngineQueryResult> {
    match query {
        EngineQuery::Select {
            scope,
            entity_id,
            policy,
        } => select_revision(conn, &policy, &scope, &entity_id).map(EngineQueryResult::Select),
        EngineQuery::History { scope, entity_id } => {
            entity_history(conn, &scope, &entity_id).map(EngineQueryResult::History)
        }
        EngineQuery::IngestRuns { scope } => {
            ingest_runs(conn, &scope).map(EngineQueryResult::IngestRuns)
        }
    }
}
