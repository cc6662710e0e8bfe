//! Domain models
//!
//! - Revisions: the append-only observations of entity rows within a scope
//! - Rows: the scraper-facing input batch
//! - Projection: typed entity/parameter/level records built by rebuild

pub mod projection;
pub mod revision;
pub mod row;

pub use projection::{
    EntityDefinition, EntityDefinitionDraft, NewParameterLevel, ParameterDefinition,
    ParameterLevel, UnitKind, UpsertOutcome,
};
pub use revision::{
    is_metadata_key, now_millis, Lineage, NewRevision, Revision, RevisionId, Scope,
    META_BASE_ENTITY, META_LEVEL, META_VARIANT,
};
pub use row::{Leveling, RawRow, RowBatch, DEFAULT_NAME_FIELD};
