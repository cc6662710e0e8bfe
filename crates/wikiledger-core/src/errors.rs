use thiserror::Error;

use crate::model::RevisionId;

/// Result type alias using LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error classes with stable `ERR_*` codes, shared by log events, the CLI and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Input/configuration
    InvalidInput,
    InvalidConfig,
    AmbiguousRunMode,

    // Revision store
    NotFound,
    AlreadyExists,
    ImmutableField,
    PinMismatch,

    // Projection
    SchemaDrift,
    UnparseableValue,

    // Integration/IO
    Io,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl ExErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::AmbiguousRunMode => "ERR_AMBIGUOUS_RUN_MODE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::ImmutableField => "ERR_IMMUTABLE_FIELD",
            ExErrorKind::PinMismatch => "ERR_PIN_MISMATCH",
            ExErrorKind::SchemaDrift => "ERR_SCHEMA_DRIFT",
            ExErrorKind::UnparseableValue => "ERR_UNPARSEABLE_VALUE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether an error of this kind aborts the unit of work it occurs in.
    ///
    /// Unparseable values are recovered locally by skipping the offending row.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExErrorKind::UnparseableValue)
    }
}

/// Structured error: a kind plus the context a diagnostic needs (operation,
/// offending entity and scope, and for schema drift the headers found).
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    scope: Option<String>,
    revision_id: Option<RevisionId>,
    message: String,
    headers: Option<Vec<String>>,
}

impl ExError {
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            scope: None,
            revision_id: None,
            message: String::new(),
            headers: None,
        }
    }

    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add scope context (rendered `source#section@format_version`)
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Add revision ID context
    pub fn with_revision_id(mut self, id: RevisionId) -> Self {
        self.revision_id = Some(id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add the headers observed when a projection group drifted
    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn revision_id(&self) -> Option<RevisionId> {
        self.revision_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(scope) = &self.scope {
            write!(f, " (scope: {})", scope)?;
        }
        if let Some(revision_id) = self.revision_id {
            write!(f, " (revision_id: {})", revision_id)?;
        }
        if let Some(headers) = &self.headers {
            write!(f, " (headers: {})", headers.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

/// Error taxonomy for ledger operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    // ===== Revision immutability =====
    /// A write tried to alter a content field of a persisted revision
    #[error("Revision {revision_id} is immutable: field '{field}' cannot be changed")]
    ImmutableFieldChanged {
        revision_id: RevisionId,
        field: String,
    },

    /// A revision with the same content already exists for this entity in this scope
    #[error("Revision for {entity_id} with hash {content_hash} already exists in {scope}")]
    DuplicateRevision {
        scope: String,
        entity_id: String,
        content_hash: String,
    },

    /// Revision not found in store
    #[error("Revision not found: {revision_id}")]
    RevisionNotFound { revision_id: RevisionId },

    /// A pinned revision does not belong to the entity/scope it is pinned for
    #[error("Pinned revision {revision_id} does not belong to entity {entity_id} in {scope}")]
    PinnedRevisionMismatch {
        scope: String,
        entity_id: String,
        revision_id: RevisionId,
    },

    // ===== Projection =====
    /// A rebuild group does not match the configured parameter layout of its entity type
    #[error(
        "Schema drift for entity {entity} ({entity_type}): {reason}; expected {expected} parameters, found {found} (headers: {headers:?})"
    )]
    SchemaDrift {
        entity: String,
        entity_type: String,
        expected: usize,
        found: usize,
        headers: Vec<String>,
        reason: String,
    },

    /// A numeric value or cost could not be parsed
    #[error("Unparseable value in field '{field}': {raw:?}")]
    UnparseableValue { field: String, raw: String },

    /// Projection definition not found
    #[error("{kind} definition not found: {key}")]
    DefinitionNotFound { kind: String, key: String },

    // ===== Configuration/input =====
    /// Both or neither of dry-run and write were requested
    #[error("Ambiguous run mode: dry_run={dry_run}, write={write}; exactly one must be set")]
    AmbiguousRunMode { dry_run: bool, write: bool },

    /// Projection configuration is invalid
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Row batch is malformed
    #[error("Invalid row batch: {reason}")]
    InvalidBatch { reason: String },

    // ===== Infrastructure =====
    /// Storage backend failure
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Serialization error (JSON/TOML encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Filesystem error
    #[error("IO error: {message}")]
    Io { message: String },

    /// Broken internal invariant
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LedgerError {
    /// Stable kind of this error
    pub fn kind(&self) -> ExErrorKind {
        match self {
            LedgerError::ImmutableFieldChanged { .. } => ExErrorKind::ImmutableField,
            LedgerError::DuplicateRevision { .. } => ExErrorKind::AlreadyExists,
            LedgerError::RevisionNotFound { .. } | LedgerError::DefinitionNotFound { .. } => {
                ExErrorKind::NotFound
            }
            LedgerError::PinnedRevisionMismatch { .. } => ExErrorKind::PinMismatch,
            LedgerError::SchemaDrift { .. } => ExErrorKind::SchemaDrift,
            LedgerError::UnparseableValue { .. } => ExErrorKind::UnparseableValue,
            LedgerError::AmbiguousRunMode { .. } => ExErrorKind::AmbiguousRunMode,
            LedgerError::InvalidConfig { .. } => ExErrorKind::InvalidConfig,
            LedgerError::InvalidBatch { .. } => ExErrorKind::InvalidInput,
            LedgerError::Persistence { .. } => ExErrorKind::Persistence,
            LedgerError::Serialization { .. } => ExErrorKind::Serialization,
            LedgerError::Io { .. } => ExErrorKind::Io,
            LedgerError::Internal { .. } => ExErrorKind::Internal,
        }
    }
}

/// Conversion from LedgerError to ExError
///
/// Keeps the structured context (entity, scope, revision, headers) that the
/// domain variant carries so diagnostics can name the offending entity.
impl From<LedgerError> for ExError {
    fn from(err: LedgerError) -> Self {
        let base = ExError::new(err.kind()).with_message(err.to_string());
        match err {
            LedgerError::ImmutableFieldChanged { revision_id, .. }
            | LedgerError::RevisionNotFound { revision_id } => base.with_revision_id(revision_id),
            LedgerError::DuplicateRevision {
                scope, entity_id, ..
            } => base.with_scope(scope).with_entity_id(entity_id),
            LedgerError::PinnedRevisionMismatch {
                scope,
                entity_id,
                revision_id,
            } => base
                .with_scope(scope)
                .with_entity_id(entity_id)
                .with_revision_id(revision_id),
            LedgerError::SchemaDrift {
                entity, headers, ..
            } => base.with_op("rebuild").with_entity_id(entity).with_headers(headers),
            LedgerError::UnparseableValue { .. } => base.with_op("parse_value"),
            LedgerError::AmbiguousRunMode { .. } => base.with_op("run_mode"),
            _ => base,
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unparseable_is_recoverable() {
        assert!(!ExErrorKind::UnparseableValue.is_fatal());
        assert!(ExErrorKind::SchemaDrift.is_fatal());
        assert!(ExErrorKind::ImmutableField.is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let err = ExError::new(ExErrorKind::SchemaDrift)
            .with_op("rebuild")
            .with_entity_id("death_wave")
            .with_headers(vec!["Damage".into(), "Range".into()]);
        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_SCHEMA_DRIFT]"));
        assert!(rendered.contains("death_wave"));
        assert!(rendered.contains("Damage, Range"));
    }
}
