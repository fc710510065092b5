//! Repository layer: entity-scoped database operations.
//!
//! Functions take a borrowed `Connection` so callers decide the locking
//! scope (see `Database::with_conn`). All public functions are re-exported
//! here.

mod delivery;
mod profile;
mod reminder;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use super::DatabaseError;

// Re-export all public items from sub-modules
pub use delivery::*;
pub use profile::*;
pub use reminder::*;

/// Timestamps are stored as RFC 3339 UTC with millisecond precision so
/// lexical order equals chronological order.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw:?}: {e}")))
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
