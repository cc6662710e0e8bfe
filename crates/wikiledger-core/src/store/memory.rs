use std::collections::BTreeMap;

use super::{newest, ProjectionStore, RevisionStore};
use crate::errors::{LedgerError, Result};
use crate::model::{
    EntityDefinition, EntityDefinitionDraft, Lineage, NewParameterLevel, NewRevision,
    ParameterDefinition, ParameterLevel, Revision, RevisionId, Scope, UnitKind, UpsertOutcome,
};

/// In-memory store for revisions and projection records
///
/// Not thread-safe; designed for single-writer use and for tests. Ids are
/// assigned sequentially from 1, so insertion order equals id order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    revisions: Vec<Revision>,
    entity_definitions: BTreeMap<String, EntityDefinition>,
    parameter_definitions: Vec<ParameterDefinition>,
    parameter_levels: Vec<ParameterLevel>,
    next_entity_id: i64,
    next_parameter_id: i64,
    next_level_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against a copy of the store and keep the copy only if `f` succeeds.
    ///
    /// A failure part-way through leaves `self` exactly as it was.
    pub fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut MemoryStore) -> Result<T>,
    {
        let mut working = self.clone();
        let out = f(&mut working)?;
        *self = working;
        Ok(out)
    }

    /// Every revision in insertion order
    pub fn all_revisions(&self) -> &[Revision] {
        &self.revisions
    }

    fn in_scope<'a>(
        &'a self,
        scope: &'a Scope,
        entity_id: &'a str,
    ) -> impl Iterator<Item = &'a Revision> + 'a {
        self.revisions
            .iter()
            .filter(move |r| &r.scope == scope && r.entity_id == entity_id)
    }
}

impl RevisionStore for MemoryStore {
    fn revision(&self, id: RevisionId) -> Result<Option<Revision>> {
        Ok(self.revisions.iter().find(|r| r.id == id).cloned())
    }

    fn revisions_for_entity(&self, scope: &Scope, entity_id: &str) -> Result<Vec<Revision>> {
        Ok(self.in_scope(scope, entity_id).cloned().collect())
    }

    fn latest_revisions_by_entity(&self, scope: &Scope) -> Result<BTreeMap<String, Revision>> {
        let mut latest: BTreeMap<String, Revision> = BTreeMap::new();
        for revision in self
            .revisions
            .iter()
            .filter(|r| &r.scope == scope && !r.is_manual())
        {
            let replace = latest
                .get(&revision.entity_id)
                .map(|current| revision.recency_key() > current.recency_key())
                .unwrap_or(true);
            if replace {
                latest.insert(revision.entity_id.clone(), revision.clone());
            }
        }
        Ok(latest)
    }

    fn revision_by_hash(
        &self,
        scope: &Scope,
        entity_id: &str,
        content_hash: &str,
        lineage: Lineage,
    ) -> Result<Option<Revision>> {
        Ok(self
            .in_scope(scope, entity_id)
            .find(|r| r.content_hash == content_hash && r.lineage() == lineage)
            .cloned())
    }

    fn latest_active_revisions(&self, format_version: &str) -> Result<Vec<Revision>> {
        let mut groups: BTreeMap<(&Scope, &str), Vec<&Revision>> = BTreeMap::new();
        for revision in self
            .revisions
            .iter()
            .filter(|r| r.scope.format_version == format_version && !r.is_manual())
        {
            groups
                .entry((&revision.scope, revision.entity_id.as_str()))
                .or_default()
                .push(revision);
        }

        let mut active: Vec<Revision> = groups
            .into_values()
            .filter_map(|history| newest(history))
            .filter(|r| !r.deprecated)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            (&a.scope.source_location, &a.scope.section, a.id).cmp(&(
                &b.scope.source_location,
                &b.scope.section,
                b.id,
            ))
        });
        Ok(active)
    }

    fn create_revision(&mut self, new: NewRevision) -> Result<Revision> {
        if self
            .revision_by_hash(
                &new.scope,
                &new.entity_id,
                &new.content_hash,
                new.lineage(),
            )?
            .is_some()
        {
            return Err(LedgerError::DuplicateRevision {
                scope: new.scope.to_string(),
                entity_id: new.entity_id,
                content_hash: new.content_hash,
            });
        }

        let revision = Revision {
            id: self.revisions.len() as RevisionId + 1,
            scope: new.scope,
            canonical_name: new.canonical_name,
            entity_id: new.entity_id,
            content_hash: new.content_hash,
            fields: new.fields,
            source_url: new.source_url,
            first_seen_at: new.seen_at,
            last_seen_at: new.seen_at,
            deprecated: false,
        };
        self.revisions.push(revision.clone());
        Ok(revision)
    }

    fn update_lifecycle(&mut self, revision: &Revision) -> Result<()> {
        let stored = self
            .revisions
            .iter_mut()
            .find(|r| r.id == revision.id)
            .ok_or(LedgerError::RevisionNotFound {
                revision_id: revision.id,
            })?;

        if let Some(field) = stored.immutable_difference(revision) {
            return Err(LedgerError::ImmutableFieldChanged {
                revision_id: revision.id,
                field: field.to_string(),
            });
        }

        stored.last_seen_at = revision.last_seen_at;
        stored.deprecated = revision.deprecated;
        Ok(())
    }
}

impl ProjectionStore for MemoryStore {
    fn entity_definition(&self, slug: &str) -> Result<Option<EntityDefinition>> {
        Ok(self.entity_definitions.get(slug).cloned())
    }

    fn entity_definitions(&self) -> Result<Vec<EntityDefinition>> {
        Ok(self.entity_definitions.values().cloned().collect())
    }

    fn upsert_entity_definition(
        &mut self,
        draft: &EntityDefinitionDraft,
    ) -> Result<(EntityDefinition, UpsertOutcome)> {
        if let Some(existing) = self.entity_definitions.get_mut(&draft.slug) {
            if !draft.differs_from(existing) {
                return Ok((existing.clone(), UpsertOutcome::Unchanged));
            }
            existing.entity_type = draft.entity_type.clone();
            existing.name = draft.name.clone();
            existing.format_version = draft.format_version.clone();
            existing.exemplar_revision_id = draft.exemplar_revision_id;
            return Ok((existing.clone(), UpsertOutcome::Updated));
        }

        self.next_entity_id += 1;
        let created = EntityDefinition {
            id: self.next_entity_id,
            slug: draft.slug.clone(),
            entity_type: draft.entity_type.clone(),
            name: draft.name.clone(),
            format_version: draft.format_version.clone(),
            exemplar_revision_id: draft.exemplar_revision_id,
        };
        self.entity_definitions
            .insert(created.slug.clone(), created.clone());
        Ok((created, UpsertOutcome::Created))
    }

    fn parameter_definition(
        &self,
        entity_definition_id: i64,
        key: &str,
    ) -> Result<Option<ParameterDefinition>> {
        Ok(self
            .parameter_definitions
            .iter()
            .find(|p| p.entity_definition_id == entity_definition_id && p.key == key)
            .cloned())
    }

    fn parameter_definitions(
        &self,
        entity_definition_id: i64,
    ) -> Result<Vec<ParameterDefinition>> {
        let mut defs: Vec<ParameterDefinition> = self
            .parameter_definitions
            .iter()
            .filter(|p| p.entity_definition_id == entity_definition_id)
            .cloned()
            .collect();
        defs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(defs)
    }

    fn upsert_parameter_definition(
        &mut self,
        entity_definition_id: i64,
        key: &str,
        unit: UnitKind,
    ) -> Result<(ParameterDefinition, UpsertOutcome)> {
        if let Some(existing) = self
            .parameter_definitions
            .iter_mut()
            .find(|p| p.entity_definition_id == entity_definition_id && p.key == key)
        {
            if existing.unit == unit {
                return Ok((existing.clone(), UpsertOutcome::Unchanged));
            }
            existing.unit = unit;
            return Ok((existing.clone(), UpsertOutcome::Updated));
        }

        self.next_parameter_id += 1;
        let created = ParameterDefinition {
            id: self.next_parameter_id,
            entity_definition_id,
            key: key.to_string(),
            unit,
        };
        self.parameter_definitions.push(created.clone());
        Ok((created, UpsertOutcome::Created))
    }

    fn parameter_levels(&self, parameter_definition_id: i64) -> Result<Vec<ParameterLevel>> {
        let mut levels: Vec<ParameterLevel> = self
            .parameter_levels
            .iter()
            .filter(|l| l.parameter_definition_id == parameter_definition_id)
            .cloned()
            .collect();
        levels.sort_by_key(|l| l.level);
        Ok(levels)
    }

    fn replace_parameter_levels(
        &mut self,
        parameter_definition_id: i64,
        levels: &[NewParameterLevel],
    ) -> Result<usize> {
        let before = self.parameter_levels.len();
        self.parameter_levels
            .retain(|l| l.parameter_definition_id != parameter_definition_id);
        let deleted = before - self.parameter_levels.len();

        for level in levels {
            self.next_level_id += 1;
            self.parameter_levels.push(ParameterLevel {
                id: self.next_level_id,
                parameter_definition_id,
                level: level.level,
                raw_value: level.raw_value.clone(),
                raw_cost: level.raw_cost.clone(),
                currency: level.currency.clone(),
                value: level.value,
                cost: level.cost,
                source_revision_id: level.source_revision_id,
            });
        }
        Ok(deleted)
    }
}
