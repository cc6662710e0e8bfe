//! Store seams
//!
//! `RevisionStore` is the only way ingestion and selection reach revisions;
//! `ProjectionStore` is the only way rebuild reaches projection records.
//! `MemoryStore` implements both in memory; the SQLite implementation lives in
//! `wikiledger-store`.

pub mod memory;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::errors::{LedgerError, Result};
use crate::model::{
    EntityDefinition, EntityDefinitionDraft, Lineage, NewParameterLevel, NewRevision,
    ParameterDefinition, ParameterLevel, Revision, RevisionId, Scope, UnitKind, UpsertOutcome,
};

pub use memory::MemoryStore;

/// Newest revision by `last_seen_at`, ties broken by insertion order.
pub fn newest<'a, I>(revisions: I) -> Option<&'a Revision>
where
    I: IntoIterator<Item = &'a Revision>,
{
    revisions.into_iter().max_by_key(|r| r.recency_key())
}

/// Access to the append-only revision history
pub trait RevisionStore {
    /// Revision by id
    fn revision(&self, id: RevisionId) -> Result<Option<Revision>>;

    /// Full history of one entity in a scope, in insertion order
    fn revisions_for_entity(&self, scope: &Scope, entity_id: &str) -> Result<Vec<Revision>>;

    /// Newest externally sourced revision per entity in a scope
    fn latest_revisions_by_entity(&self, scope: &Scope) -> Result<BTreeMap<String, Revision>>;

    /// Revision of an entity in `lineage` carrying the given content hash
    fn revision_by_hash(
        &self,
        scope: &Scope,
        entity_id: &str,
        content_hash: &str,
        lineage: Lineage,
    ) -> Result<Option<Revision>>;

    /// Latest non-deprecated external revision per (scope, entity) for a format version,
    /// ordered by source location, section, then insertion order
    fn latest_active_revisions(&self, format_version: &str) -> Result<Vec<Revision>>;

    /// Append a revision; a duplicate (scope, entity, hash) within its lineage is rejected
    fn create_revision(&mut self, new: NewRevision) -> Result<Revision>;

    /// Persist lifecycle changes of `revision`
    ///
    /// # Errors
    ///
    /// `ImmutableFieldChanged` when any other field differs from the stored row,
    /// `RevisionNotFound` when the revision does not exist.
    fn update_lifecycle(&mut self, revision: &Revision) -> Result<()>;

    /// Newest externally sourced revision of one entity
    fn latest_revision(&self, scope: &Scope, entity_id: &str) -> Result<Option<Revision>> {
        let history = self.revisions_for_entity(scope, entity_id)?;
        Ok(newest(history.iter().filter(|r| !r.is_manual())).cloned())
    }

    /// Record that identical content was observed at `now`
    fn touch_seen(&mut self, id: RevisionId, now: DateTime<Utc>) -> Result<()> {
        let mut revision = self
            .revision(id)?
            .ok_or(LedgerError::RevisionNotFound { revision_id: id })?;
        revision.last_seen_at = now;
        self.update_lifecycle(&revision)
    }

    fn set_deprecated(&mut self, id: RevisionId, deprecated: bool) -> Result<()> {
        let mut revision = self
            .revision(id)?
            .ok_or(LedgerError::RevisionNotFound { revision_id: id })?;
        revision.deprecated = deprecated;
        self.update_lifecycle(&revision)
    }
}

/// Access to the structured projection
pub trait ProjectionStore {
    fn entity_definition(&self, slug: &str) -> Result<Option<EntityDefinition>>;

    /// All entity definitions ordered by slug
    fn entity_definitions(&self) -> Result<Vec<EntityDefinition>>;

    /// Create or update by slug; unchanged content is not rewritten
    fn upsert_entity_definition(
        &mut self,
        draft: &EntityDefinitionDraft,
    ) -> Result<(EntityDefinition, UpsertOutcome)>;

    fn parameter_definition(
        &self,
        entity_definition_id: i64,
        key: &str,
    ) -> Result<Option<ParameterDefinition>>;

    /// Parameter definitions of an entity ordered by key
    fn parameter_definitions(&self, entity_definition_id: i64)
        -> Result<Vec<ParameterDefinition>>;

    /// Create or update by (entity, key)
    fn upsert_parameter_definition(
        &mut self,
        entity_definition_id: i64,
        key: &str,
        unit: UnitKind,
    ) -> Result<(ParameterDefinition, UpsertOutcome)>;

    /// Levels of a parameter ordered by level
    fn parameter_levels(&self, parameter_definition_id: i64) -> Result<Vec<ParameterLevel>>;

    /// Delete every level of the parameter and insert `levels`; returns the number deleted
    fn replace_parameter_levels(
        &mut self,
        parameter_definition_id: i64,
        levels: &[NewParameterLevel],
    ) -> Result<usize>;
}
