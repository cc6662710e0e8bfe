//! Repository layer for persisting ledger models to SQLite
//!
//! - `SqliteStore`: revisions and projection records behind the core store traits
//! - `run_ledger`: audit rows for applied ingestion runs

pub mod hydration;
pub mod run_ledger;
pub mod sqlite_store;

pub use run_ledger::{ingest_runs, record_ingest_run, IngestRunRecord};
pub use sqlite_store::SqliteStore;
