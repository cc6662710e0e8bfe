use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Store-assigned revision identifier; increases with insertion order
pub type RevisionId = i64;

/// Field key carrying the base entity id of a leveled row
pub const META_BASE_ENTITY: &str = "_base_entity";
/// Field key carrying the derived level number of a leveled row
pub const META_LEVEL: &str = "_level";
/// Field key carrying the table variant of a leveled row
pub const META_VARIANT: &str = "_variant";

/// Metadata keys are injected at the ingestion boundary and never come from the scraper.
pub fn is_metadata_key(key: &str) -> bool {
    key.starts_with('_')
}

/// Current time truncated to the millisecond precision the stores persist.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// The (source location, section, format version) triple that scopes entity identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub source_location: String,
    pub section: String,
    pub format_version: String,
}

impl Scope {
    pub fn new(
        source_location: impl Into<String>,
        section: impl Into<String>,
        format_version: impl Into<String>,
    ) -> Self {
        Self {
            source_location: source_location.into(),
            section: section.into(),
            format_version: format_version.into(),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}#{}@{}",
            self.source_location, self.section, self.format_version
        )
    }
}

/// Which history a revision belongs to
///
/// Content identity is unique per lineage: an override may carry exactly the
/// content a later scrape observes without either side colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lineage {
    External,
    Manual,
}

impl Lineage {
    fn of(source_url: &Option<String>) -> Self {
        match source_url {
            Some(_) => Lineage::External,
            None => Lineage::Manual,
        }
    }
}

/// One observed state of one entity row
///
/// Everything except `last_seen_at` and `deprecated` is fixed once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub scope: Scope,
    pub canonical_name: String,
    pub entity_id: String,
    pub content_hash: String,
    pub fields: BTreeMap<String, String>,
    /// External page the row was observed on; `None` marks a manual revision
    pub source_url: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub deprecated: bool,
}

impl Revision {
    /// Manual revisions carry no external source.
    pub fn is_manual(&self) -> bool {
        self.source_url.is_none()
    }

    pub fn lineage(&self) -> Lineage {
        Lineage::of(&self.source_url)
    }

    /// Base entity this revision projects into: the leveled-row marker, or its own id.
    pub fn base_entity(&self) -> &str {
        self.fields
            .get(META_BASE_ENTITY)
            .map(String::as_str)
            .unwrap_or(&self.entity_id)
    }

    /// Ordering key for "newest": last seen, then insertion order.
    pub fn recency_key(&self) -> (DateTime<Utc>, RevisionId) {
        (self.last_seen_at, self.id)
    }

    /// Name of the first immutable field on which `other` differs from `self`.
    pub fn immutable_difference(&self, other: &Revision) -> Option<&'static str> {
        if self.id != other.id {
            return Some("id");
        }
        if self.scope != other.scope {
            return Some("scope");
        }
        if self.canonical_name != other.canonical_name {
            return Some("canonical_name");
        }
        if self.entity_id != other.entity_id {
            return Some("entity_id");
        }
        if self.content_hash != other.content_hash {
            return Some("content_hash");
        }
        if self.fields != other.fields {
            return Some("fields");
        }
        if self.source_url != other.source_url {
            return Some("source_url");
        }
        if self.first_seen_at != other.first_seen_at {
            return Some("first_seen_at");
        }
        None
    }
}

/// Data for a revision about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRevision {
    pub scope: Scope,
    pub canonical_name: String,
    pub entity_id: String,
    pub content_hash: String,
    pub fields: BTreeMap<String, String>,
    pub source_url: Option<String>,
    /// Becomes both `first_seen_at` and `last_seen_at`
    pub seen_at: DateTime<Utc>,
}

impl NewRevision {
    pub fn lineage(&self) -> Lineage {
        Lineage::of(&self.source_url)
    }
}
