//! Command orchestration layer.
//!
//! ## Logging Ownership
//!
//! The engine layer owns lifecycle logging:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! Lower layers (store, core) use only `tracing::debug!()` / `warn!()` for internal details.

pub mod engine_command;
pub mod engine_query;
pub mod ingest;
pub mod manual;
pub mod rebuild;
pub mod select;
