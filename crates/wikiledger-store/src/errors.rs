//! Error handling for wikiledger-store
//!
//! Maps rusqlite failures onto the core `LedgerError` taxonomy

use wikiledger_core::errors::LedgerError;

/// Result type alias using LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Message raised by the revision immutability trigger
pub const IMMUTABLE_TRIGGER_MESSAGE: &str = "immutable revision field";

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> LedgerError {
    LedgerError::Persistence {
        message: format!("Migration {} failed: {}", migration_id, reason),
    }
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> LedgerError {
    LedgerError::Persistence {
        message: format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ),
    }
}

/// A stored row that does not decode into its model
pub fn corrupt_row(table: &str, id: i64, reason: impl std::fmt::Display) -> LedgerError {
    LedgerError::Serialization {
        message: format!("Corrupt {} row {}: {}", table, id, reason),
    }
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> LedgerError {
    LedgerError::Persistence {
        message: err.to_string(),
    }
}

/// Whether the error is the immutability trigger aborting an UPDATE
pub fn is_immutability_abort(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(message)) if message.contains(IMMUTABLE_TRIGGER_MESSAGE)
    )
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> LedgerError {
    LedgerError::Io {
        message: format!("{}: {}", operation, err),
    }
}
