//! Projection configuration
//!
//! Per entity type: which sections feed it, how table headers map onto the
//! closed parameter vocabulary, and how many parameters a well-formed entity has.
//! Rebuild is a pure function of (revisions, this configuration).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::errors::{LedgerError, Result};
use crate::model::{UnitKind, DEFAULT_NAME_FIELD};

fn default_name_field() -> String {
    DEFAULT_NAME_FIELD.to_string()
}

/// Canonical key and unit a header maps onto
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub key: String,
    pub unit: UnitKind,
}

/// Layout of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeConfig {
    /// Sections whose revisions project into this type
    pub sections: Vec<String>,
    pub expected_parameter_count: usize,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    #[serde(default)]
    pub level_field: Option<String>,
    #[serde(default)]
    pub cost_field: Option<String>,
    #[serde(default)]
    pub currency: String,
    /// Columns that are neither parameters nor structural
    #[serde(default)]
    pub ignored_headers: Vec<String>,
    /// Header → parameter
    pub parameters: BTreeMap<String, ParameterSpec>,
}

impl EntityTypeConfig {
    /// Whether a column carries structure (name, level, cost) or is explicitly ignored
    pub fn is_structural_header(&self, header: &str) -> bool {
        header == self.name_field
            || self.level_field.as_deref() == Some(header)
            || self.cost_field.as_deref() == Some(header)
            || self.ignored_headers.iter().any(|h| h == header)
    }
}

/// Projection configuration for every entity type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default)]
    pub entity_types: BTreeMap<String, EntityTypeConfig>,
}

impl ProjectionConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ProjectionConfig =
            toml::from_str(s).map_err(|e| LedgerError::InvalidConfig {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject configurations that would make rebuild ambiguous
    pub fn validate(&self) -> Result<()> {
        let mut section_owner: BTreeMap<&str, &str> = BTreeMap::new();
        for (type_name, cfg) in &self.entity_types {
            if cfg.expected_parameter_count == 0 {
                return Err(LedgerError::InvalidConfig {
                    reason: format!("entity type '{}' expects zero parameters", type_name),
                });
            }
            if cfg.sections.is_empty() {
                return Err(LedgerError::InvalidConfig {
                    reason: format!("entity type '{}' is bound to no section", type_name),
                });
            }
            for section in &cfg.sections {
                if let Some(other) = section_owner.insert(section, type_name) {
                    return Err(LedgerError::InvalidConfig {
                        reason: format!(
                            "section '{}' is bound to both '{}' and '{}'",
                            section, other, type_name
                        ),
                    });
                }
            }

            let mut keys = BTreeSet::new();
            for spec in cfg.parameters.values() {
                if !keys.insert(spec.key.as_str()) {
                    return Err(LedgerError::InvalidConfig {
                        reason: format!(
                            "entity type '{}' maps two headers to parameter '{}'",
                            type_name, spec.key
                        ),
                    });
                }
            }
            if let Some(header) = cfg
                .parameters
                .keys()
                .find(|h| cfg.is_structural_header(h))
            {
                return Err(LedgerError::InvalidConfig {
                    reason: format!(
                        "entity type '{}' maps structural header '{}' as a parameter",
                        type_name, header
                    ),
                });
            }
        }
        Ok(())
    }

    /// Entity type a section projects into
    pub fn entity_type_for_section(&self, section: &str) -> Option<(&str, &EntityTypeConfig)> {
        self.entity_types
            .iter()
            .find(|(_, cfg)| cfg.sections.iter().any(|s| s == section))
            .map(|(name, cfg)| (name.as_str(), cfg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[entity_types.ultimate_weapon]
sections = ["death_wave", "chain_lightning"]
expected_parameter_count = 2
cost_field = "Cost"
currency = "stones"

[entity_types.ultimate_weapon.parameters]
"Damage" = { key = "damage", unit = "multiplier" }
"Cooldown" = { key = "cooldown", unit = "seconds" }
"#;

    #[test]
    fn test_parse_sample() {
        let config = ProjectionConfig::from_toml_str(SAMPLE).unwrap();
        let (name, cfg) = config.entity_type_for_section("death_wave").unwrap();
        assert_eq!(name, "ultimate_weapon");
        assert_eq!(cfg.name_field, "Name");
        assert_eq!(cfg.parameters["Cooldown"].unit, UnitKind::Seconds);
        assert!(cfg.is_structural_header("Cost"));
        assert!(config.entity_type_for_section("perks").is_none());
    }

    #[test]
    fn test_section_bound_twice_is_rejected() {
        let doubled = format!(
            "{}\n[entity_types.other]\nsections = [\"death_wave\"]\nexpected_parameter_count = 1\n[entity_types.other.parameters]\n\"X\" = {{ key = \"x\", unit = \"flat\" }}\n",
            SAMPLE
        );
        let err = ProjectionConfig::from_toml_str(&doubled).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfig { .. }));
    }

    #[test]
    fn test_duplicate_parameter_key_is_rejected() {
        let toml = r#"
[entity_types.perk]
sections = ["perks"]
expected_parameter_count = 1
[entity_types.perk.parameters]
"Effect" = { key = "effect", unit = "percent" }
"Bonus" = { key = "effect", unit = "percent" }
"#;
        assert!(ProjectionConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let toml = r#"
[entity_types.perk]
sections = ["perks"]
expected_parameter_count = 1
[entity_types.perk.parameters]
"Effect" = { key = "effect", unit = "furlongs" }
"#;
        assert!(matches!(
            ProjectionConfig::from_toml_str(toml),
            Err(LedgerError::InvalidConfig { .. })
        ));
    }
}
