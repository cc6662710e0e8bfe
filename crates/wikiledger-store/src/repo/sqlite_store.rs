//! SQLite implementation of the core store traits
//!
//! `SqliteStore` borrows a connection. Pass a `Transaction` (it derefs to
//! `Connection`) to make a whole ingestion batch or rebuild one atomic unit.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, is_immutability_abort, Result};
use crate::repo::hydration::{
    into_parameter_definition, read_entity_definition, read_parameter_definition,
    read_parameter_level, RevisionRow, REVISION_COLUMNS,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use wikiledger_core::errors::LedgerError;
use wikiledger_core::model::{
    EntityDefinition, EntityDefinitionDraft, Lineage, NewParameterLevel, NewRevision,
    ParameterDefinition, ParameterLevel, Revision, RevisionId, Scope, UnitKind, UpsertOutcome,
};
use wikiledger_core::store::{newest, ProjectionStore, RevisionStore};

/// Revision and projection store over a borrowed SQLite connection
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        self.conn
    }

    fn query_revisions<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Revision>> {
        let mut stmt = self.conn.prepare(sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(params, RevisionRow::read)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        rows.into_iter().map(RevisionRow::into_revision).collect()
    }

    /// Number of revisions stored for a scope
    pub fn revision_count(&self, scope: &Scope) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM revisions
                 WHERE source_location = ?1 AND section = ?2 AND format_version = ?3",
                params![scope.source_location, scope.section, scope.format_version],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        Ok(count as usize)
    }
}

impl RevisionStore for SqliteStore<'_> {
    fn revision(&self, id: RevisionId) -> Result<Option<Revision>> {
        let sql = format!("SELECT {} FROM revisions WHERE id = ?1", REVISION_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, [id], RevisionRow::read)
            .optional()
            .map_err(from_rusqlite)?;
        row.map(RevisionRow::into_revision).transpose()
    }

    fn revisions_for_entity(&self, scope: &Scope, entity_id: &str) -> Result<Vec<Revision>> {
        let sql = format!(
            "SELECT {} FROM revisions
             WHERE source_location = ?1 AND section = ?2 AND format_version = ?3 AND entity_id = ?4
             ORDER BY id",
            REVISION_COLUMNS
        );
        self.query_revisions(
            &sql,
            params![
                scope.source_location,
                scope.section,
                scope.format_version,
                entity_id
            ],
        )
    }

    fn latest_revisions_by_entity(&self, scope: &Scope) -> Result<BTreeMap<String, Revision>> {
        let sql = format!(
            "SELECT {} FROM revisions
             WHERE source_location = ?1 AND section = ?2 AND format_version = ?3
               AND source_url IS NOT NULL
             ORDER BY entity_id, id",
            REVISION_COLUMNS
        );
        let revisions = self.query_revisions(
            &sql,
            params![scope.source_location, scope.section, scope.format_version],
        )?;

        let mut by_entity: BTreeMap<String, Vec<Revision>> = BTreeMap::new();
        for revision in revisions {
            by_entity
                .entry(revision.entity_id.clone())
                .or_default()
                .push(revision);
        }
        Ok(by_entity
            .into_iter()
            .filter_map(|(entity, history)| newest(&history).cloned().map(|r| (entity, r)))
            .collect())
    }

    fn revision_by_hash(
        &self,
        scope: &Scope,
        entity_id: &str,
        content_hash: &str,
        lineage: Lineage,
    ) -> Result<Option<Revision>> {
        let lineage_clause = match lineage {
            Lineage::External => "source_url IS NOT NULL",
            Lineage::Manual => "source_url IS NULL",
        };
        let sql = format!(
            "SELECT {} FROM revisions
             WHERE source_location = ?1 AND section = ?2 AND format_version = ?3
               AND entity_id = ?4 AND content_hash = ?5 AND {}",
            REVISION_COLUMNS, lineage_clause
        );
        let row = self
            .conn
            .query_row(
                &sql,
                params![
                    scope.source_location,
                    scope.section,
                    scope.format_version,
                    entity_id,
                    content_hash
                ],
                RevisionRow::read,
            )
            .optional()
            .map_err(from_rusqlite)?;
        row.map(RevisionRow::into_revision).transpose()
    }

    fn latest_active_revisions(&self, format_version: &str) -> Result<Vec<Revision>> {
        // Newest per (scope, entity): no later last_seen_at, and no equal one with a higher id
        let sql = format!(
            "SELECT {} FROM revisions r
             WHERE r.format_version = ?1 AND r.source_url IS NOT NULL AND r.deprecated = 0
               AND NOT EXISTS (
                 SELECT 1 FROM revisions o
                 WHERE o.source_location = r.source_location
                   AND o.section = r.section
                   AND o.format_version = r.format_version
                   AND o.entity_id = r.entity_id
                   AND o.source_url IS NOT NULL
                   AND (o.last_seen_at > r.last_seen_at
                        OR (o.last_seen_at = r.last_seen_at AND o.id > r.id))
               )
             ORDER BY r.source_location, r.section, r.id",
            REVISION_COLUMNS
                .split(", ")
                .map(|c| format!("r.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.query_revisions(&sql, [format_version])
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

        let fields = serde_json::to_string(&new.fields)?;
        let seen_at = new.seen_at.timestamp_millis();
        self.conn
            .execute(
                "INSERT INTO revisions (source_location, section, format_version, canonical_name,
                    entity_id, content_hash, fields, source_url, first_seen_at, last_seen_at, deprecated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, 0)",
                params![
                    new.scope.source_location,
                    new.scope.section,
                    new.scope.format_version,
                    new.canonical_name,
                    new.entity_id,
                    new.content_hash,
                    fields,
                    new.source_url,
                    seen_at,
                ],
            )
            .map_err(from_rusqlite)?;

        let id = self.conn.last_insert_rowid();
        tracing::debug!(revision_id = id, entity_id = %new.entity_id, "Revision created");
        self.revision(id)?
            .ok_or(LedgerError::RevisionNotFound { revision_id: id })
    }

    fn update_lifecycle(&mut self, revision: &Revision) -> Result<()> {
        let stored = self
            .revision(revision.id)?
            .ok_or(LedgerError::RevisionNotFound {
                revision_id: revision.id,
            })?;

        if let Some(field) = stored.immutable_difference(revision) {
            return Err(LedgerError::ImmutableFieldChanged {
                revision_id: revision.id,
                field: field.to_string(),
            });
        }

        self.conn
            .execute(
                "UPDATE revisions SET last_seen_at = ?1, deprecated = ?2 WHERE id = ?3",
                params![
                    revision.last_seen_at.timestamp_millis(),
                    revision.deprecated,
                    revision.id
                ],
            )
            .map_err(|e| {
                if is_immutability_abort(&e) {
                    LedgerError::ImmutableFieldChanged {
                        revision_id: revision.id,
                        field: "content".to_string(),
                    }
                } else {
                    from_rusqlite(e)
                }
            })?;
        Ok(())
    }
}

impl ProjectionStore for SqliteStore<'_> {
    fn entity_definition(&self, slug: &str) -> Result<Option<EntityDefinition>> {
        self.conn
            .query_row(
                "SELECT id, slug, entity_type, name, format_version, exemplar_revision_id
                 FROM entity_definitions WHERE slug = ?1",
                [slug],
                read_entity_definition,
            )
            .optional()
            .map_err(from_rusqlite)
    }

    fn entity_definitions(&self) -> Result<Vec<EntityDefinition>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, slug, entity_type, name, format_version, exemplar_revision_id
                 FROM entity_definitions ORDER BY slug",
            )
            .map_err(from_rusqlite)?;
        let defs = stmt
            .query_map([], read_entity_definition)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(defs)
    }

    fn upsert_entity_definition(
        &mut self,
        draft: &EntityDefinitionDraft,
    ) -> Result<(EntityDefinition, UpsertOutcome)> {
        let outcome = match self.entity_definition(&draft.slug)? {
            Some(existing) if !draft.differs_from(&existing) => {
                return Ok((existing, UpsertOutcome::Unchanged))
            }
            Some(existing) => {
                self.conn
                    .execute(
                        "UPDATE entity_definitions
                         SET entity_type = ?1, name = ?2, format_version = ?3, exemplar_revision_id = ?4
                         WHERE id = ?5",
                        params![
                            draft.entity_type,
                            draft.name,
                            draft.format_version,
                            draft.exemplar_revision_id,
                            existing.id
                        ],
                    )
                    .map_err(from_rusqlite)?;
                UpsertOutcome::Updated
            }
            None => {
                self.conn
                    .execute(
                        "INSERT INTO entity_definitions
                            (slug, entity_type, name, format_version, exemplar_revision_id)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            draft.slug,
                            draft.entity_type,
                            draft.name,
                            draft.format_version,
                            draft.exemplar_revision_id
                        ],
                    )
                    .map_err(from_rusqlite)?;
                UpsertOutcome::Created
            }
        };

        let definition =
            self.entity_definition(&draft.slug)?
                .ok_or_else(|| LedgerError::DefinitionNotFound {
                    kind: "entity".to_string(),
                    key: draft.slug.clone(),
                })?;
        Ok((definition, outcome))
    }

    fn parameter_definition(
        &self,
        entity_definition_id: i64,
        key: &str,
    ) -> Result<Option<ParameterDefinition>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, entity_definition_id, key, unit FROM parameter_definitions
                 WHERE entity_definition_id = ?1 AND key = ?2",
                params![entity_definition_id, key],
                read_parameter_definition,
            )
            .optional()
            .map_err(from_rusqlite)?;
        raw.map(into_parameter_definition).transpose()
    }

    fn parameter_definitions(
        &self,
        entity_definition_id: i64,
    ) -> Result<Vec<ParameterDefinition>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, entity_definition_id, key, unit FROM parameter_definitions
                 WHERE entity_definition_id = ?1 ORDER BY key",
            )
            .map_err(from_rusqlite)?;
        let raw = stmt
            .query_map([entity_definition_id], read_parameter_definition)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        raw.into_iter().map(into_parameter_definition).collect()
    }

    fn upsert_parameter_definition(
        &mut self,
        entity_definition_id: i64,
        key: &str,
        unit: UnitKind,
    ) -> Result<(ParameterDefinition, UpsertOutcome)> {
        let outcome = match self.parameter_definition(entity_definition_id, key)? {
            Some(existing) if existing.unit == unit => {
                return Ok((existing, UpsertOutcome::Unchanged))
            }
            Some(existing) => {
                self.conn
                    .execute(
                        "UPDATE parameter_definitions SET unit = ?1 WHERE id = ?2",
                        params![unit.as_str(), existing.id],
                    )
                    .map_err(from_rusqlite)?;
                UpsertOutcome::Updated
            }
            None => {
                self.conn
                    .execute(
                        "INSERT INTO parameter_definitions (entity_definition_id, key, unit)
                         VALUES (?1, ?2, ?3)",
                        params![entity_definition_id, key, unit.as_str()],
                    )
                    .map_err(from_rusqlite)?;
                UpsertOutcome::Created
            }
        };

        let definition = self
            .parameter_definition(entity_definition_id, key)?
            .ok_or_else(|| LedgerError::DefinitionNotFound {
                kind: "parameter".to_string(),
                key: key.to_string(),
            })?;
        Ok((definition, outcome))
    }

    fn parameter_levels(&self, parameter_definition_id: i64) -> Result<Vec<ParameterLevel>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, parameter_definition_id, level, raw_value, raw_cost, currency,
                        value, cost, source_revision_id
                 FROM parameter_levels WHERE parameter_definition_id = ?1 ORDER BY level",
            )
            .map_err(from_rusqlite)?;
        let levels = stmt
            .query_map([parameter_definition_id], read_parameter_level)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(levels)
    }

    fn replace_parameter_levels(
        &mut self,
        parameter_definition_id: i64,
        levels: &[NewParameterLevel],
    ) -> Result<usize> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM parameter_levels WHERE parameter_definition_id = ?1",
                [parameter_definition_id],
            )
            .map_err(from_rusqlite)?;

        let mut stmt = self
            .conn
            .prepare(
                "INSERT INTO parameter_levels (parameter_definition_id, level, raw_value, raw_cost,
                    currency, value, cost, source_revision_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(from_rusqlite)?;
        for level in levels {
            stmt.execute(params![
                parameter_definition_id,
                level.level,
                level.raw_value,
                level.raw_cost,
                level.currency,
                level.value,
                level.cost,
                level.source_revision_id,
            ])
            .map_err(from_rusqlite)?;
        }

        Ok(deleted)
    }
}
