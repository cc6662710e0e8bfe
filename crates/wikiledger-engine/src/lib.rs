//! wikiledger engine - orchestration layer
//!
//! Runs the core pipelines against a SQLite connection: each ingestion batch and
//! each rebuild is one transaction, and every command owns its lifecycle logging.

pub mod commands;

pub use commands::engine_command::{apply_engine_command, EngineCommand, EngineCommandResult};
pub use commands::engine_query::{apply_engine_query, EngineQuery, EngineQueryResult};
