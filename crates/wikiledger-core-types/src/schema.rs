//! Field keys and event names shared by every structured log line

/// Operation name (`ingest`, `rebuild`, `select`, ...)
pub const FIELD_OP: &str = "op";
/// Lifecycle position of the event within its operation
pub const FIELD_EVENT: &str = "event";
pub const FIELD_RUN_ID: &str = "run_id";
/// Stable `ERR_*` code on `end_error` events
pub const FIELD_ERR_CODE: &str = "err_code";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
