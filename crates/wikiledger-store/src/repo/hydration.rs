//! Hydration layer - decodes SQLite rows into core models
//!
//! Row readers return plain column tuples; conversion into models happens here so
//! decode failures surface as `LedgerError::Serialization` naming the row.

#![allow(clippy::result_large_err)]

use crate::errors::{corrupt_row, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use std::collections::BTreeMap;
use std::str::FromStr;
use wikiledger_core::model::{
    EntityDefinition, ParameterDefinition, ParameterLevel, Revision, Scope, UnitKind,
};

/// Column list matching [`RevisionRow::read`]
pub const REVISION_COLUMNS: &str = "id, source_location, section, format_version, canonical_name, \
     entity_id, content_hash, fields, source_url, first_seen_at, last_seen_at, deprecated";

/// Raw columns of one `revisions` row
pub struct RevisionRow {
    id: i64,
    source_location: String,
    section: String,
    format_version: String,
    canonical_name: String,
    entity_id: String,
    content_hash: String,
    fields: String,
    source_url: Option<String>,
    first_seen_at: i64,
    last_seen_at: i64,
    deprecated: i64,
}

impl RevisionRow {
    pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_location: row.get(1)?,
            section: row.get(2)?,
            format_version: row.get(3)?,
            canonical_name: row.get(4)?,
            entity_id: row.get(5)?,
            content_hash: row.get(6)?,
            fields: row.get(7)?,
            source_url: row.get(8)?,
            first_seen_at: row.get(9)?,
            last_seen_at: row.get(10)?,
            deprecated: row.get(11)?,
        })
    }

    pub fn into_revision(self) -> Result<Revision> {
        let fields: BTreeMap<String, String> =
            serde_json::from_str(&self.fields).map_err(|e| corrupt_row("revisions", self.id, e))?;
        Ok(Revision {
            id: self.id,
            scope: Scope::new(self.source_location, self.section, self.format_version),
            canonical_name: self.canonical_name,
            entity_id: self.entity_id,
            content_hash: self.content_hash,
            fields,
            source_url: self.source_url,
            first_seen_at: millis_to_datetime("revisions", self.id, self.first_seen_at)?,
            last_seen_at: millis_to_datetime("revisions", self.id, self.last_seen_at)?,
            deprecated: self.deprecated != 0,
        })
    }
}

pub fn millis_to_datetime(table: &str, id: i64, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| corrupt_row(table, id, format!("timestamp {} out of range", millis)))
}

pub fn read_entity_definition(row: &Row<'_>) -> rusqlite::Result<EntityDefinition> {
    Ok(EntityDefinition {
        id: row.get(0)?,
        slug: row.get(1)?,
        entity_type: row.get(2)?,
        name: row.get(3)?,
        format_version: row.get(4)?,
        exemplar_revision_id: row.get(5)?,
    })
}

/// Raw columns of one `parameter_definitions` row; `unit` is decoded afterwards
pub fn read_parameter_definition(row: &Row<'_>) -> rusqlite::Result<(i64, i64, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

pub fn into_parameter_definition(raw: (i64, i64, String, String)) -> Result<ParameterDefinition> {
    let (id, entity_definition_id, key, unit) = raw;
    let unit = UnitKind::from_str(&unit).map_err(|e| corrupt_row("parameter_definitions", id, e))?;
    Ok(ParameterDefinition {
        id,
        entity_definition_id,
        key,
        unit,
    })
}

pub fn read_parameter_level(row: &Row<'_>) -> rusqlite::Result<ParameterLevel> {
    Ok(ParameterLevel {
        id: row.get(0)?,
        parameter_definition_id: row.get(1)?,
        level: row.get(2)?,
        raw_value: row.get(3)?,
        raw_cost: row.get(4)?,
        currency: row.get(5)?,
        value: row.get(6)?,
        cost: row.get(7)?,
        source_revision_id: row.get(8)?,
    })
}
