//! Core types shared across wikiledger facilities
//!
//! - **Correlation**: `RunId` tags every ingestion and rebuild run
//! - **Schema constants**: canonical field keys and event names for structured logs

pub mod correlation;
pub mod schema;

pub use correlation::RunId;
