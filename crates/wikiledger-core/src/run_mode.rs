//! Dry-run / write selection shared by ingestion and rebuild

use crate::errors::{LedgerError, Result};

/// Whether a run applies its classification-driven writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    DryRun,
    Write,
}

impl RunMode {
    /// Resolve the two operator flags; exactly one must be set.
    pub fn from_flags(dry_run: bool, write: bool) -> Result<Self> {
        match (dry_run, write) {
            (true, false) => Ok(RunMode::DryRun),
            (false, true) => Ok(RunMode::Write),
            _ => Err(LedgerError::AmbiguousRunMode { dry_run, write }),
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, RunMode::Write)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::DryRun => "dry_run",
            RunMode::Write => "write",
        }
    }
}
