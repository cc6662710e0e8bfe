//! Read-side commands: revision selection and entity history.

#![allow(clippy::result_large_err)]

use rusqlite::Connection;
use wikiledger_core::model::{Revision, Scope};
use wikiledger_core::selection::{select, SelectionMode, SelectionPolicy};
use wikiledger_core::{log_op_end, log_op_error, log_op_start, RevisionStore};
use wikiledger_store::errors::Result;
use wikiledger_store::SqliteStore;

fn mode_label(mode: &SelectionMode) -> &'static str {
    match mode {
        SelectionMode::Latest => "latest",
        SelectionMode::Manual => "manual",
        SelectionMode::AsOf(_) => "as_of",
    }
}

/// Resolve the revision readers should see for `entity_id` under `policy`.
///
/// ## Errors
///
/// - `PinnedRevisionMismatch`: a pin names a missing or foreign revision
/// - `Persistence`: database error
pub fn select_revision(
    conn: &Connection,
    policy: &SelectionPolicy,
    scope: &Scope,
    entity_id: &str,
) -> Result<Option<Revision>> {
    log_op_start!(
        "select",
        scope = %scope,
        entity_id = entity_id,
        mode = mode_label(&policy.mode),
        pins = policy.pinned.len()
    );
    let start = std::time::Instant::now();

    let store = SqliteStore::new(conn);
    let selected = select(&store, policy, scope, entity_id).map_err(|e| {
        log_op_error!(
            "select",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            entity_id = entity_id
        );
        e
    })?;

    log_op_end!(
        "select",
        duration_ms = start.elapsed().as_millis() as u64,
        revision_id = selected.as_ref().map(|r| r.id)
    );
    Ok(selected)
}

/// Every revision of an entity in insertion order, both lineages.
pub fn entity_history(conn: &Connection, scope: &Scope, entity_id: &str) -> Result<Vec<Revision>> {
    log_op_start!("history", scope = %scope, entity_id = entity_id);
    let start = std::time::Instant::now();

    let store = SqliteStore::new(conn);
    let history = store.revisions_for_entity(scope, entity_id).map_err(|e| {
        log_op_error!(
            "history",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "history",
        duration_ms = start.elapsed().as_millis() as u64,
        revisions = history.len()
    );
    Ok(history)
}
