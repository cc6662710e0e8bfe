//! wikiledger store - SQLite persistence for the revision ledger
//!
//! Provides:
//! - SQLite schema with an embedded, checksummed migrations framework
//! - `SqliteStore`, implementing the core `RevisionStore` and `ProjectionStore` traits
//! - Revision immutability enforced by a `BEFORE UPDATE` trigger as well as in code
//! - The ingest run ledger

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

// Re-export key types
pub use errors::Result;
pub use repo::{IngestRunRecord, SqliteStore};
