//! Manual overrides: human-entered revisions with no external source.
//!
//! Manual revisions live beside the scraped lineage of the same entity. Ingestion
//! never treats them as a baseline, so a later scrape cannot deprecate them.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;

use rusqlite::Connection;
use wikiledger_core::errors::LedgerError;
use wikiledger_core::hashing::content_hash;
use wikiledger_core::identity::{derive_entity_id, is_placeholder, normalize_text};
use wikiledger_core::model::{is_metadata_key, now_millis, Lineage, NewRevision, Revision, Scope};
use wikiledger_core::{log_op_end, log_op_error, log_op_start, RevisionStore};
use wikiledger_store::errors::{from_rusqlite, Result};
use wikiledger_store::SqliteStore;

/// Record a manual revision for the entity named `name`.
///
/// Field keys and values are normalized the way ingestion normalizes scraped
/// cells, so an override hashes identically to the same scraped content.
/// Re-recording an existing manual revision refreshes its `last_seen_at`; a
/// scraped revision with the same content is a separate lineage and is not touched.
///
/// ## Errors
///
/// - `InvalidBatch`: blank name or no fields
/// - `Persistence`: database error
pub fn record_manual_revision(
    conn: &mut Connection,
    scope: &Scope,
    name: &str,
    fields: &BTreeMap<String, String>,
) -> Result<Revision> {
    log_op_start!("record_manual", scope = %scope, name = name);
    let start = std::time::Instant::now();

    let revision = record_impl(conn, scope, name, fields).map_err(|e| {
        log_op_error!(
            "record_manual",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "record_manual",
        duration_ms = start.elapsed().as_millis() as u64,
        entity_id = %revision.entity_id,
        revision_id = revision.id
    );
    Ok(revision)
}

fn record_impl(
    conn: &mut Connection,
    scope: &Scope,
    name: &str,
    fields: &BTreeMap<String, String>,
) -> Result<Revision> {
    let canonical_name = normalize_text(name);
    if is_placeholder(&canonical_name) {
        return Err(LedgerError::InvalidBatch {
            reason: "manual revision needs a name".to_string(),
        });
    }

    let fields: BTreeMap<String, String> = fields
        .iter()
        .map(|(k, v)| (normalize_text(k), normalize_text(v)))
        .filter(|(k, _)| !k.is_empty() && !is_metadata_key(k))
        .collect();
    if fields.is_empty() {
        return Err(LedgerError::InvalidBatch {
            reason: format!("manual revision for '{}' has no fields", canonical_name),
        });
    }

    let entity_id = derive_entity_id(&canonical_name);
    let hash = content_hash(&fields);
    let now = now_millis();

    let tx = conn.transaction().map_err(from_rusqlite)?;
    let revision = {
        let mut store = SqliteStore::new(&tx);
        match store.revision_by_hash(scope, &entity_id, &hash, Lineage::Manual)? {
            Some(existing) => {
                store.touch_seen(existing.id, now)?;
                store
                    .revision(existing.id)?
                    .ok_or(LedgerError::RevisionNotFound {
                        revision_id: existing.id,
                    })?
            }
            None => store.create_revision(NewRevision {
                scope: scope.clone(),
                canonical_name,
                entity_id,
                content_hash: hash,
                fields,
                source_url: None,
                seen_at: now,
            })?,
        }
    };
    tx.commit().map_err(from_rusqlite)?;
    Ok(revision)
}
