//! Revision selection policy
//!
//! Read-only: picks the revision downstream readers should see for one entity.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::errors::{LedgerError, Result};
use crate::model::{Revision, RevisionId, Scope};
use crate::store::{newest, RevisionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Newest non-deprecated revision of either lineage
    Latest,
    /// Newest manual revision; external revisions are ignored
    Manual,
    /// Newest revision that existed at the given instant, deprecation ignored
    AsOf(DateTime<Utc>),
}

/// Selection mode plus per-entity pins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub mode: SelectionMode,
    /// entity id → revision id; overrides `mode` for the listed entities
    pub pinned: BTreeMap<String, RevisionId>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::latest()
    }
}

impl SelectionPolicy {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            pinned: BTreeMap::new(),
        }
    }

    pub fn latest() -> Self {
        Self::new(SelectionMode::Latest)
    }

    pub fn manual() -> Self {
        Self::new(SelectionMode::Manual)
    }

    pub fn as_of(at: DateTime<Utc>) -> Self {
        Self::new(SelectionMode::AsOf(at))
    }

    pub fn with_pin(mut self, entity_id: impl Into<String>, revision_id: RevisionId) -> Self {
        self.pinned.insert(entity_id.into(), revision_id);
        self
    }
}

/// Resolve the revision of `entity_id` in `scope` under `policy`.
///
/// # Errors
///
/// `PinnedRevisionMismatch` when a pin names a revision that does not exist or
/// belongs to another entity or scope.
pub fn select<S>(
    store: &S,
    policy: &SelectionPolicy,
    scope: &Scope,
    entity_id: &str,
) -> Result<Option<Revision>>
where
    S: RevisionStore + ?Sized,
{
    if let Some(&revision_id) = policy.pinned.get(entity_id) {
        return match store.revision(revision_id)? {
            Some(rev) if &rev.scope == scope && rev.entity_id == entity_id => Ok(Some(rev)),
            _ => Err(LedgerError::PinnedRevisionMismatch {
                scope: scope.to_string(),
                entity_id: entity_id.to_string(),
                revision_id,
            }),
        };
    }

    let history = store.revisions_for_entity(scope, entity_id)?;
    let selected = match policy.mode {
        SelectionMode::Latest => newest(history.iter().filter(|r| !r.deprecated)),
        SelectionMode::Manual => newest(history.iter().filter(|r| r.is_manual())),
        SelectionMode::AsOf(at) => history
            .iter()
            .filter(|r| r.first_seen_at <= at)
            .max_by_key(|r| (r.first_seen_at, r.id)),
    };
    Ok(selected.cloned())
}
