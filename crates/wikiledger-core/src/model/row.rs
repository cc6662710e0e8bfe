//! Scraper-facing row batch
//!
//! The scraper hands over one batch per scope. Row order is part of the contract:
//! for leveled tables without a level column, the first row is level 1 and the
//! level increments with each row of the scraped sequence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::revision::Scope;

/// Column used as the name hint when a row carries no explicit `name`
pub const DEFAULT_NAME_FIELD: &str = "Name";

/// One raw table row as extracted from the page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRow {
    /// Canonical-name hint; falls back to the `Name` column
    #[serde(default)]
    pub name: Option<String>,
    pub fields: BTreeMap<String, String>,
    /// Page the row came from; falls back to the scope's source location
    #[serde(default)]
    pub source_url: Option<String>,
}

impl RawRow {
    pub fn new(name: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            name: Some(name.into()),
            fields,
            source_url: None,
        }
    }

    /// Build a row from `(column, value)` pairs without a name hint
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: None,
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            source_url: None,
        }
    }

    /// Name hint after defaulting; empty when neither the hint nor the column exists
    pub fn name_hint(&self) -> &str {
        self.name
            .as_deref()
            .or_else(|| self.fields.get(DEFAULT_NAME_FIELD).map(String::as_str))
            .unwrap_or("")
    }
}

/// Describes a leveled table: every row is one level of a single base entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leveling {
    pub base_name: String,
    /// Distinguishes several level tables of the same base entity
    #[serde(default)]
    pub variant: Option<String>,
    /// Column holding an explicit level number; row position is used when absent
    #[serde(default)]
    pub level_field: Option<String>,
}

/// Ordered rows for one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowBatch {
    #[serde(flatten)]
    pub scope: Scope,
    #[serde(default)]
    pub leveling: Option<Leveling>,
    pub rows: Vec<RawRow>,
}

impl RowBatch {
    pub fn new(scope: Scope, rows: Vec<RawRow>) -> Self {
        Self {
            scope,
            leveling: None,
            rows,
        }
    }

    pub fn leveled(scope: Scope, leveling: Leveling, rows: Vec<RawRow>) -> Self {
        Self {
            scope,
            leveling: Some(leveling),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_hint_defaults_to_name_column() {
        let row = RawRow::from_pairs([("Name", "Coin Bonus"), ("Effect", "+5%")]);
        assert_eq!(row.name_hint(), "Coin Bonus");

        let explicit = RawRow {
            name: Some("Override".into()),
            ..row
        };
        assert_eq!(explicit.name_hint(), "Override");
    }

    #[test]
    fn test_batch_json_shape() {
        let json = r#"{
            "source_location": "wiki/Ultimate_Weapons",
            "section": "death_wave",
            "format_version": "v1",
            "leveling": { "base_name": "Death Wave" },
            "rows": [ { "fields": { "Damage": "x2", "Cost": "10" } } ]
        }"#;
        let batch: RowBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.scope.section, "death_wave");
        assert_eq!(batch.leveling.unwrap().level_field, None);
        assert_eq!(batch.rows.len(), 1);
        assert_eq!(batch.rows[0].name, None);
    }
}
