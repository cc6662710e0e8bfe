//! wikiledger core - revision ledger and projection kernel
//!
//! This crate provides the pure domain of the ledger, including:
//! - Text normalization and entity identity derivation
//! - Content hashing of normalized field maps
//! - The `RevisionStore` / `ProjectionStore` seams and an in-memory store
//! - The ingestion/diff engine with dry-run parity
//! - Revision selection (latest, manual, as-of, pinned)
//! - The rebuild pipeline projecting revisions into typed entities
//!
//! Persistence lives in `wikiledger-store`; orchestration in `wikiledger-engine`.

pub mod config;
pub mod errors;
pub mod hashing;
pub mod identity;
pub mod ingest;
pub mod logging_facility;
pub mod model;
pub mod rebuild;
pub mod run_mode;
pub mod selection;
pub mod store;
pub mod values;

// Re-export commonly used types
pub use config::{EntityTypeConfig, ParameterSpec, ProjectionConfig};
pub use errors::{ExError, ExErrorKind, LedgerError, Result};
pub use ingest::{ingest, IngestPlan, IngestSummary};
pub use model::{Leveling, Lineage, NewRevision, RawRow, Revision, RevisionId, RowBatch, Scope};
pub use rebuild::{rebuild, EntityFailure, RebuildReport, RebuildSummary};
pub use run_mode::RunMode;
pub use selection::{select, SelectionMode, SelectionPolicy};
pub use store::{MemoryStore, ProjectionStore, RevisionStore};
