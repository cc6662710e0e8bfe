//! Ingestion and diff engine
//!
//! Classification is computed once into an [`IngestPlan`] from the batch and the
//! store's baseline. A dry run returns the plan's summary; a write applies the plan's
//! actions in order. Both paths share every classification decision.
//!
//! ## Per-row classification
//! - no baseline entry for the entity id: **added**, create a revision
//! - same content hash: **unchanged**, refresh `last_seen_at` and clear `deprecated`
//! - different hash: **changed**, create a revision (or reactivate the one that already
//!   carries that hash) and use it as the baseline for the rest of the batch
//!
//! Baseline entities the batch never touched are **deprecated**.
//!
//! Only the external lineage takes part: manual revisions are neither a baseline
//! nor a reactivation candidate, even when their content matches the scraped row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{LedgerError, Result};
use crate::hashing::content_hash;
use crate::identity::{
    derive_composite_id, derive_entity_id, is_placeholder, is_total_marker, normalize_text,
};
use crate::model::{
    is_metadata_key, Leveling, Lineage, NewRevision, RawRow, RevisionId, RowBatch, Scope,
    DEFAULT_NAME_FIELD, META_BASE_ENTITY, META_LEVEL, META_VARIANT,
};
use crate::run_mode::RunMode;
use crate::store::RevisionStore;

/// Counts reported by an ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub added: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub deprecated: usize,
    /// Placeholder and summary rows dropped before identity assignment
    pub skipped: usize,
}

/// Classification of one surviving row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClass {
    Added,
    Changed,
    Unchanged,
}

/// A store mutation decided by classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Create(NewRevision),
    /// Set `last_seen_at = now` and clear `deprecated`
    Refresh { revision_id: RevisionId },
    Deprecate { revision_id: RevisionId },
}

/// Everything an ingestion run would do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestPlan {
    pub scope: Scope,
    pub now: DateTime<Utc>,
    /// (entity id, classification) per surviving row, in input order
    pub classifications: Vec<(String, RowClass)>,
    /// Entity ids classified deprecated, in id order
    pub deprecated_entities: Vec<String>,
    pub actions: Vec<PlannedAction>,
    pub summary: IngestSummary,
}

/// A row after filtering, normalization and identity assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRow {
    pub canonical_name: String,
    pub entity_id: String,
    pub fields: BTreeMap<String, String>,
    pub content_hash: String,
    pub source_url: String,
}

/// Baseline state of one entity during planning
#[derive(Debug, Clone)]
struct BaselineEntry {
    content_hash: String,
    /// `None` while the revision is only planned
    revision_id: Option<RevisionId>,
    last_seen_at: DateTime<Utc>,
    deprecated: bool,
}

fn normalize_fields(raw: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    raw.iter()
        .map(|(k, v)| (normalize_text(k), normalize_text(v)))
        .filter(|(k, _)| !k.is_empty() && !is_metadata_key(k))
        .collect()
}

/// Placeholder or summary row: dropped before hashing
fn is_non_entity_row(canonical_name: &str, fields: &BTreeMap<String, String>, leveled: bool) -> bool {
    if !leveled && (is_placeholder(canonical_name) || is_total_marker(canonical_name)) {
        return true;
    }

    let data: Vec<&String> = fields
        .iter()
        .filter(|(k, _)| leveled || k.as_str() != DEFAULT_NAME_FIELD)
        .map(|(_, v)| v)
        .collect();

    if data.iter().all(|v| is_placeholder(v)) {
        return true;
    }

    let totals = data.iter().filter(|v| is_total_marker(v)).count();
    totals > 0 && data.iter().all(|v| is_total_marker(v) || is_placeholder(v))
}

fn explicit_level(fields: &BTreeMap<String, String>, leveling: &Leveling) -> Option<u32> {
    let column = leveling.level_field.as_deref()?;
    let cell = fields.get(&normalize_text(column))?;
    cell.trim().parse::<u32>().ok()
}

/// Filter, normalize and identify the rows of a batch.
///
/// Returns the surviving rows in input order plus the number of rows dropped.
pub fn prepare_rows(batch: &RowBatch) -> Result<(Vec<PreparedRow>, usize)> {
    validate_scope(&batch.scope)?;

    let leveled_base = match &batch.leveling {
        Some(leveling) => {
            let base_name = normalize_text(&leveling.base_name);
            if is_placeholder(&base_name) {
                return Err(LedgerError::InvalidBatch {
                    reason: "leveled batch has no base name".to_string(),
                });
            }
            Some((leveling, base_name))
        }
        None => None,
    };

    let mut prepared = Vec::with_capacity(batch.rows.len());
    let mut skipped = 0;

    for (position, row) in batch.rows.iter().enumerate() {
        let mut fields = normalize_fields(&row.fields);
        let canonical_name = match &leveled_base {
            Some((_, base_name)) => base_name.clone(),
            None => normalize_text(row.name_hint()),
        };

        if is_non_entity_row(&canonical_name, &fields, leveled_base.is_some()) {
            tracing::debug!(
                scope = %batch.scope,
                position,
                name = %canonical_name,
                "Skipping placeholder row"
            );
            skipped += 1;
            continue;
        }

        let entity_id = match &leveled_base {
            Some((leveling, base_name)) => {
                // Position among surviving rows, 1-based, when no level column.
                let level =
                    explicit_level(&fields, leveling).unwrap_or(prepared.len() as u32 + 1);
                let base_id = derive_entity_id(base_name);
                let variant = leveling
                    .variant
                    .as_deref()
                    .map(normalize_text)
                    .filter(|v| !v.is_empty());

                fields.insert(META_BASE_ENTITY.to_string(), base_id.clone());
                fields.insert(META_LEVEL.to_string(), level.to_string());
                if let Some(v) = &variant {
                    fields.insert(META_VARIANT.to_string(), v.clone());
                }
                derive_composite_id(&base_id, level, variant.as_deref())
            }
            None => derive_entity_id(&canonical_name),
        };

        let hash = content_hash(&fields);
        prepared.push(PreparedRow {
            canonical_name,
            entity_id,
            content_hash: hash,
            fields,
            source_url: source_url_for(row, &batch.scope),
        });
    }

    Ok((prepared, skipped))
}

fn source_url_for(row: &RawRow, scope: &Scope) -> String {
    row.source_url
        .as_deref()
        .map(normalize_text)
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| scope.source_location.clone())
}

fn validate_scope(scope: &Scope) -> Result<()> {
    for (name, value) in [
        ("source_location", &scope.source_location),
        ("section", &scope.section),
        ("format_version", &scope.format_version),
    ] {
        if value.trim().is_empty() {
            return Err(LedgerError::InvalidBatch {
                reason: format!("scope {} is empty", name),
            });
        }
    }
    Ok(())
}

/// Classify a batch against the store without touching it.
pub fn plan_ingest<S>(store: &S, batch: &RowBatch, now: DateTime<Utc>) -> Result<IngestPlan>
where
    S: RevisionStore + ?Sized,
{
    let (rows, skipped) = prepare_rows(batch)?;
    let scope = batch.scope.clone();

    let pre_batch = store.latest_revisions_by_entity(&scope)?;
    let mut baseline: BTreeMap<String, BaselineEntry> = pre_batch
        .iter()
        .map(|(entity_id, rev)| {
            (
                entity_id.clone(),
                BaselineEntry {
                    content_hash: rev.content_hash.clone(),
                    revision_id: Some(rev.id),
                    last_seen_at: rev.last_seen_at,
                    deprecated: rev.deprecated,
                },
            )
        })
        .collect();

    let mut summary = IngestSummary {
        skipped,
        ..IngestSummary::default()
    };
    let mut classifications = Vec::with_capacity(rows.len());
    let mut actions = Vec::new();
    let mut touched: BTreeSet<String> = BTreeSet::new();
    // (entity, hash) revisions planned in this batch but not yet stored
    let mut planned: BTreeSet<(String, String)> = BTreeSet::new();

    for row in rows {
        touched.insert(row.entity_id.clone());

        let class = match baseline.get(&row.entity_id) {
            None => RowClass::Added,
            Some(entry) if entry.content_hash == row.content_hash => RowClass::Unchanged,
            Some(_) => RowClass::Changed,
        };

        match class {
            RowClass::Added | RowClass::Changed => {
                let key = (row.entity_id.clone(), row.content_hash.clone());
                let existing = if planned.contains(&key) {
                    None
                } else {
                    store.revision_by_hash(
                        &scope,
                        &row.entity_id,
                        &row.content_hash,
                        Lineage::External,
                    )?
                };

                let revision_id = match existing {
                    Some(known) => {
                        actions.push(PlannedAction::Refresh {
                            revision_id: known.id,
                        });
                        Some(known.id)
                    }
                    None if planned.contains(&key) => None,
                    None => {
                        actions.push(PlannedAction::Create(NewRevision {
                            scope: scope.clone(),
                            canonical_name: row.canonical_name.clone(),
                            entity_id: row.entity_id.clone(),
                            content_hash: row.content_hash.clone(),
                            fields: row.fields,
                            source_url: Some(row.source_url),
                            seen_at: now,
                        }));
                        planned.insert(key);
                        None
                    }
                };

                baseline.insert(
                    row.entity_id.clone(),
                    BaselineEntry {
                        content_hash: row.content_hash,
                        revision_id,
                        last_seen_at: now,
                        deprecated: false,
                    },
                );
            }
            RowClass::Unchanged => {
                if let Some(entry) = baseline.get_mut(&row.entity_id) {
                    if let Some(revision_id) = entry.revision_id {
                        if entry.last_seen_at < now || entry.deprecated {
                            actions.push(PlannedAction::Refresh { revision_id });
                            entry.last_seen_at = now;
                            entry.deprecated = false;
                        }
                    }
                }
            }
        }

        match class {
            RowClass::Added => summary.added += 1,
            RowClass::Changed => summary.changed += 1,
            RowClass::Unchanged => summary.unchanged += 1,
        }
        classifications.push((row.entity_id, class));
    }

    let mut deprecated_entities = Vec::new();
    for (entity_id, rev) in &pre_batch {
        if touched.contains(entity_id) {
            continue;
        }
        summary.deprecated += 1;
        deprecated_entities.push(entity_id.clone());
        if !rev.deprecated {
            actions.push(PlannedAction::Deprecate {
                revision_id: rev.id,
            });
        }
    }

    Ok(IngestPlan {
        scope,
        now,
        classifications,
        deprecated_entities,
        actions,
        summary,
    })
}

/// Apply a plan's actions in order.
///
/// Callers provide atomicity: a SQLite transaction or [`crate::store::MemoryStore::atomically`].
pub fn apply_plan<S>(store: &mut S, plan: &IngestPlan) -> Result<()>
where
    S: RevisionStore + ?Sized,
{
    for action in &plan.actions {
        match action {
            PlannedAction::Create(new) => {
                store.create_revision(new.clone())?;
            }
            PlannedAction::Refresh { revision_id } => {
                let mut revision =
                    store
                        .revision(*revision_id)?
                        .ok_or(LedgerError::RevisionNotFound {
                            revision_id: *revision_id,
                        })?;
                revision.last_seen_at = plan.now;
                revision.deprecated = false;
                store.update_lifecycle(&revision)?;
            }
            PlannedAction::Deprecate { revision_id } => {
                store.set_deprecated(*revision_id, true)?;
            }
        }
    }
    Ok(())
}

/// Classify a batch and, in write mode, apply the result.
pub fn ingest<S>(
    store: &mut S,
    batch: &RowBatch,
    mode: RunMode,
    now: DateTime<Utc>,
) -> Result<IngestSummary>
where
    S: RevisionStore + ?Sized,
{
    let plan = plan_ingest(&*store, batch, now)?;
    if mode.is_write() {
        apply_plan(store, &plan)?;
    }
    tracing::debug!(
        scope = %plan.scope,
        mode = mode.as_str(),
        actions = plan.actions.len(),
        "Ingestion plan resolved"
    );
    Ok(plan.summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("wiki/Perks", "perks", "v1")
    }

    #[test]
    fn test_placeholder_rows_are_dropped() {
        let batch = RowBatch::new(
            scope(),
            vec![
                RawRow::from_pairs([("Name", "Coin Bonus"), ("Effect", "+5%")]),
                RawRow::from_pairs([("Name", "-"), ("Effect", "+1%")]),
                RawRow::from_pairs([("Name", "Empty Perk"), ("Effect", "—")]),
                RawRow::from_pairs([("Name", ""), ("Effect", "Total")]),
                RawRow::from_pairs([("Name", "Total"), ("Effect", "12%")]),
                RawRow::from_pairs([("Name", "Sum"), ("Effect", "Total"), ("Max", "")]),
            ],
        );
        let (rows, skipped) = prepare_rows(&batch).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_id, "coin_bonus");
        assert_eq!(skipped, 5);
    }

    #[test]
    fn test_leveled_rows_get_positional_levels_and_metadata() {
        let batch = RowBatch::leveled(
            Scope::new("wiki/UW", "death_wave", "v1"),
            Leveling {
                base_name: "Death Wave".into(),
                variant: None,
                level_field: None,
            },
            vec![
                RawRow::from_pairs([("Damage", "x2"), ("Cost", "10")]),
                RawRow::from_pairs([("Damage", "x3"), ("Cost", "20")]),
                RawRow::from_pairs([("Damage", "x4"), ("Cost", "40")]),
            ],
        );
        let (rows, _) = prepare_rows(&batch).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["death_wave_lvl_1", "death_wave_lvl_2", "death_wave_lvl_3"]
        );
        assert_eq!(rows[2].fields[META_LEVEL], "3");
        assert_eq!(rows[2].fields[META_BASE_ENTITY], "death_wave");
        assert!(rows.iter().all(|r| r.canonical_name == "Death Wave"));
    }

    #[test]
    fn test_leading_separator_row_does_not_shift_levels() {
        let batch = RowBatch::leveled(
            Scope::new("wiki/UW", "death_wave", "v1"),
            Leveling {
                base_name: "Death Wave".into(),
                variant: None,
                level_field: None,
            },
            vec![
                RawRow::from_pairs([("Damage", "-"), ("Cost", "-")]),
                RawRow::from_pairs([("Damage", "x2"), ("Cost", "10")]),
                RawRow::from_pairs([("Damage", "x3"), ("Cost", "20")]),
                RawRow::from_pairs([("Damage", "x4"), ("Cost", "40")]),
            ],
        );
        let (rows, skipped) = prepare_rows(&batch).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(skipped, 1);
        assert_eq!(
            ids,
            vec!["death_wave_lvl_1", "death_wave_lvl_2", "death_wave_lvl_3"]
        );
        assert_eq!(rows[0].fields["Damage"], "x2");
        assert_eq!(rows[0].fields[META_LEVEL], "1");
    }

    #[test]
    fn test_explicit_level_column_wins_over_position() {
        let batch = RowBatch::leveled(
            Scope::new("wiki/UW", "death_wave", "v1"),
            Leveling {
                base_name: "Death Wave".into(),
                variant: Some("Damage".into()),
                level_field: Some("Level".into()),
            },
            vec![
                RawRow::from_pairs([("Level", "5"), ("Damage", "x2")]),
                RawRow::from_pairs([("Level", ""), ("Damage", "x3")]),
            ],
        );
        let (rows, _) = prepare_rows(&batch).unwrap();
        assert_eq!(rows[0].entity_id, "death_wave_damage_lvl_5");
        assert_eq!(rows[1].entity_id, "death_wave_damage_lvl_2");
    }

    #[test]
    fn test_scraper_metadata_keys_are_stripped() {
        let batch = RowBatch::new(
            scope(),
            vec![RawRow::from_pairs([
                ("Name", "Coin Bonus"),
                ("Effect", "+5%"),
                ("_level", "9"),
            ])],
        );
        let (rows, _) = prepare_rows(&batch).unwrap();
        assert!(!rows[0].fields.contains_key(META_LEVEL));
    }

    #[test]
    fn test_empty_scope_rejected() {
        let batch = RowBatch::new(Scope::new("wiki/Perks", " ", "v1"), vec![]);
        assert!(matches!(
            prepare_rows(&batch),
            Err(LedgerError::InvalidBatch { .. })
        ));
    }
}
