//! Operation lifecycle macros
//!
//! Every ledger operation logs a `start` event and then exactly one of `end` or
//! `end_error`. Extra fields use `tracing` field syntax and follow the fixed ones.

/// Log the start of an operation
///
/// ```
/// # use wikiledger_core::log_op_start;
/// log_op_start!("ingest");
/// log_op_start!("ingest", section = "perks", rows = 12);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::EVENT_START,
            $($($field)*)?
        )
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use wikiledger_core::log_op_end;
/// log_op_end!("rebuild", duration_ms = 42);
/// log_op_end!("rebuild", duration_ms = 42, failures = 0);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::EVENT_END,
            duration_ms = $duration,
            $($($field)*)?
        )
    };
}

/// Log a failed operation
///
/// `$err` is anything convertible into `ExError`; the event carries its kind,
/// stable code and rendered message.
///
/// ```
/// # use wikiledger_core::log_op_error;
/// # use wikiledger_core::errors::LedgerError;
/// let err = LedgerError::RevisionNotFound { revision_id: 7 };
/// log_op_error!("select", err, duration_ms = 3);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            message = %ex_err,
            $($($field)*)?
        )
    }};
}
