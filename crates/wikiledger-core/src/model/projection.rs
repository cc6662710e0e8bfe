//! Projection records produced by rebuild

use serde::{Deserialize, Serialize};

use super::revision::RevisionId;
use crate::errors::LedgerError;

/// Declared unit of a parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Flat,
    Percent,
    Multiplier,
    Seconds,
    Count,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Flat => "flat",
            UnitKind::Percent => "percent",
            UnitKind::Multiplier => "multiplier",
            UnitKind::Seconds => "seconds",
            UnitKind::Count => "count",
        }
    }
}

impl std::str::FromStr for UnitKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(UnitKind::Flat),
            "percent" => Ok(UnitKind::Percent),
            "multiplier" => Ok(UnitKind::Multiplier),
            "seconds" => Ok(UnitKind::Seconds),
            "count" => Ok(UnitKind::Count),
            other => Err(LedgerError::InvalidConfig {
                reason: format!("unknown unit kind '{}'", other),
            }),
        }
    }
}

/// Typed entity keyed by slug
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub id: i64,
    pub slug: String,
    pub entity_type: String,
    pub name: String,
    pub format_version: String,
    /// Revision the descriptive metadata was taken from
    pub exemplar_revision_id: RevisionId,
}

/// Entity definition content before it has a store id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDefinitionDraft {
    pub slug: String,
    pub entity_type: String,
    pub name: String,
    pub format_version: String,
    pub exemplar_revision_id: RevisionId,
}

impl EntityDefinitionDraft {
    /// Whether persisting this draft over `existing` would change anything
    pub fn differs_from(&self, existing: &EntityDefinition) -> bool {
        self.entity_type != existing.entity_type
            || self.name != existing.name
            || self.format_version != existing.format_version
            || self.exemplar_revision_id != existing.exemplar_revision_id
    }
}

/// Parameter of an entity, keyed by (entity, key)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub id: i64,
    pub entity_definition_id: i64,
    pub key: String,
    pub unit: UnitKind,
}

/// One level of a parameter, with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterLevel {
    pub id: i64,
    pub parameter_definition_id: i64,
    pub level: u32,
    pub raw_value: String,
    pub raw_cost: String,
    pub currency: String,
    pub value: f64,
    pub cost: Option<f64>,
    pub source_revision_id: RevisionId,
}

/// Level content before it is attached to a parameter definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewParameterLevel {
    pub level: u32,
    pub raw_value: String,
    pub raw_cost: String,
    pub currency: String,
    pub value: f64,
    pub cost: Option<f64>,
    pub source_revision_id: RevisionId,
}

/// What a natural-key upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_kind_round_trips_through_str() {
        for unit in [
            UnitKind::Flat,
            UnitKind::Percent,
            UnitKind::Multiplier,
            UnitKind::Seconds,
            UnitKind::Count,
        ] {
            assert_eq!(unit.as_str().parse::<UnitKind>().unwrap(), unit);
        }
        assert!("furlongs".parse::<UnitKind>().is_err());
    }
}
