//! Rebuild/projection pipeline
//!
//! Projects the latest active revisions of one format version into entity,
//! parameter and level records.
//!
//! ## Flow
//! 1. bind each candidate revision to an entity type through its section
//! 2. group by (entity type, base entity, source location)
//! 3. plan each group: drift checks, level resolution, value parsing; a drifted
//!    group becomes an [`EntityFailure`] and contributes no writes
//! 4. project every planned group: upsert definitions by natural key, replace levels
//! 5. clear the levels of definitions of this format version the run did not
//!    project: entities whose revisions are all deprecated and parameters whose
//!    key was removed from the config
//!
//! Definitions are never deleted, only emptied. A slug is global, so a second
//! page carrying the same base entity is reported as drift naming both pages.
//!
//! Planning is pure. Projection either writes (`Write`) or only looks up what a
//! write would do (`DryRun`), so both modes report identical counts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{EntityTypeConfig, ProjectionConfig};
use crate::errors::{LedgerError, Result};
use crate::identity::{is_placeholder, is_total_marker, normalize_text};
use crate::model::{
    is_metadata_key, EntityDefinitionDraft, NewParameterLevel, Revision, UnitKind, UpsertOutcome,
    META_LEVEL,
};
use crate::run_mode::RunMode;
use crate::store::{ProjectionStore, RevisionStore};
use crate::values::parse_magnitude;

/// Counts reported by a rebuild run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildSummary {
    /// Entity and parameter definitions created
    pub created_definitions: usize,
    /// Entity and parameter definitions whose content changed
    pub updated_definitions: usize,
    pub created_levels: usize,
    pub deleted_levels: usize,
    /// Rows dropped because a value or cost could not be parsed
    pub skipped_levels: usize,
    /// Candidate revisions whose section is bound to no entity type
    pub skipped_revisions: usize,
}

/// An entity the rebuild refused to project
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFailure {
    pub entity: String,
    pub entity_type: String,
    pub error: LedgerError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildReport {
    pub summary: RebuildSummary,
    pub failures: Vec<EntityFailure>,
}

impl RebuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Levels of one parameter, ready to replace the stored ones
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterPlan {
    pub key: String,
    pub unit: UnitKind,
    pub levels: Vec<NewParameterLevel>,
}

/// Everything one entity group projects to
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPlan {
    pub definition: EntityDefinitionDraft,
    /// Ordered by key
    pub parameters: Vec<ParameterPlan>,
    pub skipped_levels: usize,
}

/// Level of a revision: `_level` metadata, then the configured level column, then 1.
fn resolve_level(revision: &Revision, cfg: &EntityTypeConfig) -> u32 {
    let from_meta = revision
        .fields
        .get(META_LEVEL)
        .and_then(|v| v.trim().parse::<u32>().ok());
    let from_column = || {
        cfg.level_field
            .as_ref()
            .and_then(|column| revision.fields.get(column))
            .and_then(|v| v.trim().parse::<u32>().ok())
    };
    from_meta.or_else(from_column).unwrap_or(1)
}

/// Parameter-bearing columns of a revision
fn parameter_headers<'a>(revision: &'a Revision, cfg: &EntityTypeConfig) -> Vec<&'a str> {
    revision
        .fields
        .keys()
        .map(String::as_str)
        .filter(|h| !is_metadata_key(h) && !cfg.is_structural_header(h))
        .collect()
}

fn is_blank_cell(value: &str) -> bool {
    is_placeholder(value) || is_total_marker(value)
}

/// Plan the projection of one entity group.
///
/// # Errors
///
/// `SchemaDrift` when a header is not mapped, when the number of distinct
/// parameters differs from the configured count, or when two rows contribute
/// the same parameter at the same level.
pub fn plan_entity(
    entity_type: &str,
    cfg: &EntityTypeConfig,
    base_entity: &str,
    format_version: &str,
    revisions: &[Revision],
) -> Result<EntityPlan> {
    let mut ordered: Vec<(u32, &Revision)> = revisions
        .iter()
        .map(|r| (resolve_level(r, cfg), r))
        .collect();
    ordered.sort_by_key(|(level, r)| (*level, r.id));

    let exemplar = ordered
        .first()
        .map(|(_, r)| *r)
        .ok_or_else(|| LedgerError::Internal {
            message: format!("entity group '{}' has no revisions", base_entity),
        })?;

    let all_headers: BTreeSet<&str> = ordered
        .iter()
        .flat_map(|(_, r)| parameter_headers(r, cfg))
        .collect();
    let drift = |reason: String, found: usize| LedgerError::SchemaDrift {
        entity: base_entity.to_string(),
        entity_type: entity_type.to_string(),
        expected: cfg.expected_parameter_count,
        found,
        headers: all_headers.iter().map(|h| h.to_string()).collect(),
        reason,
    };

    let mut keys: BTreeSet<&str> = BTreeSet::new();
    for header in &all_headers {
        match cfg.parameters.get(*header) {
            Some(spec) => {
                keys.insert(spec.key.as_str());
            }
            None => {
                return Err(drift(
                    format!("unmapped header '{}'", header),
                    all_headers.len(),
                ))
            }
        }
    }
    if keys.len() != cfg.expected_parameter_count {
        return Err(drift("parameter count mismatch".to_string(), keys.len()));
    }

    let mut by_key: BTreeMap<&str, ParameterPlan> = BTreeMap::new();
    let mut seen: BTreeSet<(&str, u32)> = BTreeSet::new();
    let mut skipped_levels = 0;

    for (level, revision) in &ordered {
        for header in parameter_headers(revision, cfg) {
            let Some(spec) = cfg.parameters.get(header) else {
                continue;
            };
            if !seen.insert((spec.key.as_str(), *level)) {
                return Err(drift(
                    format!("parameter '{}' appears twice at level {}", spec.key, level),
                    keys.len(),
                ));
            }

            let plan = by_key.entry(spec.key.as_str()).or_insert_with(|| ParameterPlan {
                key: spec.key.clone(),
                unit: spec.unit,
                levels: Vec::new(),
            });

            let raw_value = revision.fields.get(header).cloned().unwrap_or_default();
            let raw_cost = cfg
                .cost_field
                .as_ref()
                .and_then(|column| revision.fields.get(column))
                .cloned();

            if is_blank_cell(&raw_value) || raw_cost.as_deref().is_some_and(is_blank_cell) {
                continue;
            }

            let parsed = parse_magnitude(header, &raw_value).and_then(|value| {
                let cost = match &raw_cost {
                    Some(raw) => {
                        let column = cfg.cost_field.as_deref().unwrap_or_default();
                        Some(parse_magnitude(column, raw)?)
                    }
                    None => None,
                };
                Ok((value, cost))
            });
            let (value, cost) = match parsed {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!(
                        entity = base_entity,
                        entity_type,
                        level = *level,
                        revision_id = revision.id,
                        error = %err,
                        "Skipping unparseable level"
                    );
                    skipped_levels += 1;
                    continue;
                }
            };

            plan.levels.push(NewParameterLevel {
                level: *level,
                raw_value,
                raw_cost: raw_cost.unwrap_or_default(),
                currency: cfg.currency.clone(),
                value,
                cost,
                source_revision_id: revision.id,
            });
        }
    }

    Ok(EntityPlan {
        definition: EntityDefinitionDraft {
            slug: base_entity.to_string(),
            entity_type: entity_type.to_string(),
            name: normalize_text(&exemplar.canonical_name),
            format_version: format_version.to_string(),
            exemplar_revision_id: exemplar.id,
        },
        parameters: by_key.into_values().collect(),
        skipped_levels,
    })
}

fn count_outcome(summary: &mut RebuildSummary, outcome: UpsertOutcome) {
    match outcome {
        UpsertOutcome::Created => summary.created_definitions += 1,
        UpsertOutcome::Updated => summary.updated_definitions += 1,
        UpsertOutcome::Unchanged => {}
    }
}

/// Persist one planned entity, or in dry-run mode compute what persisting would do.
fn project_entity<S>(
    store: &mut S,
    plan: &EntityPlan,
    mode: RunMode,
    summary: &mut RebuildSummary,
) -> Result<()>
where
    S: ProjectionStore + ?Sized,
{
    summary.skipped_levels += plan.skipped_levels;

    if mode.is_write() {
        let (definition, outcome) = store.upsert_entity_definition(&plan.definition)?;
        count_outcome(summary, outcome);
        for parameter in &plan.parameters {
            let (param_def, outcome) =
                store.upsert_parameter_definition(definition.id, &parameter.key, parameter.unit)?;
            count_outcome(summary, outcome);
            summary.deleted_levels +=
                store.replace_parameter_levels(param_def.id, &parameter.levels)?;
            summary.created_levels += parameter.levels.len();
        }
        return Ok(());
    }

    let existing = store.entity_definition(&plan.definition.slug)?;
    let outcome = match &existing {
        None => UpsertOutcome::Created,
        Some(def) if plan.definition.differs_from(def) => UpsertOutcome::Updated,
        Some(_) => UpsertOutcome::Unchanged,
    };
    count_outcome(summary, outcome);

    for parameter in &plan.parameters {
        let stored = match &existing {
            Some(def) => store.parameter_definition(def.id, &parameter.key)?,
            None => None,
        };
        match stored {
            None => count_outcome(summary, UpsertOutcome::Created),
            Some(param_def) => {
                if param_def.unit != parameter.unit {
                    count_outcome(summary, UpsertOutcome::Updated);
                }
                summary.deleted_levels += store.parameter_levels(param_def.id)?.len();
            }
        }
        summary.created_levels += parameter.levels.len();
    }
    Ok(())
}

/// Empty the levels of every parameter of `format_version` this run did not project.
///
/// Covers definitions whose entity has no active revision any more and
/// parameters whose key left the config. Definitions themselves stay; drifted
/// entities keep their stored levels.
fn clear_stale_levels<S>(
    store: &mut S,
    format_version: &str,
    projected: &BTreeMap<String, BTreeSet<String>>,
    failed: &BTreeSet<String>,
    mode: RunMode,
    summary: &mut RebuildSummary,
) -> Result<()>
where
    S: ProjectionStore + ?Sized,
{
    for definition in store.entity_definitions()? {
        if definition.format_version != format_version || failed.contains(&definition.slug) {
            continue;
        }
        let live_keys = projected.get(&definition.slug);
        for parameter in store.parameter_definitions(definition.id)? {
            if live_keys.is_some_and(|keys| keys.contains(&parameter.key)) {
                continue;
            }
            let cleared = if mode.is_write() {
                store.replace_parameter_levels(parameter.id, &[])?
            } else {
                store.parameter_levels(parameter.id)?.len()
            };
            if cleared > 0 {
                tracing::debug!(
                    entity = %definition.slug,
                    parameter = %parameter.key,
                    cleared,
                    "Cleared levels no longer backed by an active revision"
                );
            }
            summary.deleted_levels += cleared;
        }
    }
    Ok(())
}

/// Rebuild the projection of `format_version`.
///
/// Drifted entities are reported in [`RebuildReport::failures`] and leave their
/// stored projection untouched. Levels of other definitions of this format
/// version that no active revision backs are cleared. Store errors abort the
/// whole run; callers wrap the call in one transaction.
pub fn rebuild<S>(
    store: &mut S,
    format_version: &str,
    config: &ProjectionConfig,
    mode: RunMode,
) -> Result<RebuildReport>
where
    S: RevisionStore + ProjectionStore + ?Sized,
{
    let candidates = store.latest_active_revisions(format_version)?;
    let mut report = RebuildReport::default();

    // (entity type, base entity, page): one page's rows never merge with another's
    let mut groups: BTreeMap<(String, String, String), Vec<Revision>> = BTreeMap::new();
    for revision in candidates {
        match config.entity_type_for_section(&revision.scope.section) {
            Some((type_name, _)) => {
                let key = (
                    type_name.to_string(),
                    revision.base_entity().to_string(),
                    revision.scope.source_location.clone(),
                );
                groups.entry(key).or_default().push(revision);
            }
            None => {
                tracing::debug!(
                    section = %revision.scope.section,
                    revision_id = revision.id,
                    "Section bound to no entity type"
                );
                report.summary.skipped_revisions += 1;
            }
        }
    }

    // slug -> (entity type, page) of the group that projected it
    let mut slug_owner: BTreeMap<String, (String, String)> = BTreeMap::new();
    let mut projected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut failed: BTreeSet<String> = BTreeSet::new();

    for ((type_name, base_entity, page), revisions) in &groups {
        let Some(cfg) = config.entity_types.get(type_name) else {
            continue;
        };

        let planned = match slug_owner.get(base_entity) {
            Some((owner_type, owner_page)) => Err(LedgerError::SchemaDrift {
                entity: base_entity.clone(),
                entity_type: type_name.clone(),
                expected: cfg.expected_parameter_count,
                found: 0,
                headers: Vec::new(),
                reason: format!(
                    "slug already projected as '{}' from {}; also found on {}",
                    owner_type, owner_page, page
                ),
            }),
            None => plan_entity(type_name, cfg, base_entity, format_version, revisions),
        };

        match planned {
            Ok(plan) => {
                slug_owner.insert(base_entity.clone(), (type_name.clone(), page.clone()));
                projected.insert(
                    base_entity.clone(),
                    plan.parameters.iter().map(|p| p.key.clone()).collect(),
                );
                project_entity(&mut *store, &plan, mode, &mut report.summary)?;
            }
            Err(error @ LedgerError::SchemaDrift { .. }) => {
                tracing::warn!(
                    entity = %base_entity,
                    entity_type = %type_name,
                    page = %page,
                    error = %error,
                    "Schema drift, entity not projected"
                );
                failed.insert(base_entity.clone());
                report.failures.push(EntityFailure {
                    entity: base_entity.clone(),
                    entity_type: type_name.clone(),
                    error,
                });
            }
            Err(other) => return Err(other),
        }
    }

    clear_stale_levels(
        &mut *store,
        format_version,
        &projected,
        &failed,
        mode,
        &mut report.summary,
    )?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scope;
    use chrono::Utc;

    fn cfg() -> EntityTypeConfig {
        let toml = r#"
[entity_types.ultimate_weapon]
sections = ["death_wave"]
expected_parameter_count = 1
cost_field = "Cost"
currency = "stones"
[entity_types.ultimate_weapon.parameters]
"Damage" = { key = "damage", unit = "multiplier" }
"#;
        ProjectionConfig::from_toml_str(toml)
            .unwrap()
            .entity_types
            .remove("ultimate_weapon")
            .unwrap()
    }

    fn revision(id: i64, level: u32, damage: &str, cost: &str) -> Revision {
        let fields = BTreeMap::from([
            ("Damage".to_string(), damage.to_string()),
            ("Cost".to_string(), cost.to_string()),
            ("_base_entity".to_string(), "death_wave".to_string()),
            ("_level".to_string(), level.to_string()),
        ]);
        let now = Utc::now();
        Revision {
            id,
            scope: Scope::new("wiki/UW", "death_wave", "v1"),
            canonical_name: "Death Wave".into(),
            entity_id: format!("death_wave_lvl_{}", level),
            content_hash: format!("{:064}", id),
            fields,
            source_url: Some("wiki/UW".into()),
            first_seen_at: now,
            last_seen_at: now,
            deprecated: false,
        }
    }

    #[test]
    fn test_levels_follow_level_metadata() {
        let revs = vec![
            revision(3, 2, "x3", "20"),
            revision(2, 1, "x2", "10"),
        ];
        let plan = plan_entity("ultimate_weapon", &cfg(), "death_wave", "v1", &revs).unwrap();
        assert_eq!(plan.definition.exemplar_revision_id, 2);
        let levels = &plan.parameters[0].levels;
        assert_eq!(levels.len(), 2);
        assert_eq!((levels[0].level, levels[0].value), (1, 2.0));
        assert_eq!(levels[1].cost, Some(20.0));
        assert_eq!(levels[1].currency, "stones");
    }

    #[test]
    fn test_unparseable_value_skipped_and_counted() {
        let revs = vec![revision(1, 1, "x2", "10"), revision(2, 2, "lots", "20")];
        let plan = plan_entity("ultimate_weapon", &cfg(), "death_wave", "v1", &revs).unwrap();
        assert_eq!(plan.parameters[0].levels.len(), 1);
        assert_eq!(plan.skipped_levels, 1);
    }

    #[test]
    fn test_placeholder_cost_drops_level_silently() {
        let revs = vec![revision(1, 1, "x2", "-"), revision(2, 2, "x3", "20")];
        let plan = plan_entity("ultimate_weapon", &cfg(), "death_wave", "v1", &revs).unwrap();
        assert_eq!(plan.parameters[0].levels.len(), 1);
        assert_eq!(plan.skipped_levels, 0);
    }

    #[test]
    fn test_unmapped_header_is_drift() {
        let mut rev = revision(1, 1, "x2", "10");
        rev.fields.insert("Range".into(), "40".into());
        let err = plan_entity("ultimate_weapon", &cfg(), "death_wave", "v1", &[rev]).unwrap_err();
        match err {
            LedgerError::SchemaDrift { headers, .. } => {
                assert_eq!(headers, vec!["Damage".to_string(), "Range".to_string()])
            }
            other => panic!("expected drift, got {other:?}"),
        }
    }

    #[test]
    fn test_same_level_twice_is_drift() {
        let revs = vec![revision(1, 1, "x2", "10"), revision(2, 1, "x3", "20")];
        let err = plan_entity("ultimate_weapon", &cfg(), "death_wave", "v1", &revs).unwrap_err();
        assert!(matches!(err, LedgerError::SchemaDrift { .. }));
    }
}
