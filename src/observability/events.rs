//! Observable events of the query engine
//!
//! Events are explicit and typed; the string form is what lands in the
//! `event` field of a log line.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Policy file loaded and checked
    ConfigLoaded,
    /// Projection binding registered
    ProjectionRegistered,

    // Query lifecycle
    QueryReceived,
    /// Query passed validation
    QueryValidated,
    /// Query failed validation and was never translated
    QueryBlocked,
    QueryExecuted,
    /// Translation or storage failure
    QueryFailed,
    /// Caller-enforced deadline expired
    QueryTimeout,

    // Self-healing paths
    /// Cursor could not be decoded; paging restarted from the first page
    CursorDecodeFailed,
    /// Total count failed; response carries no count
    CountFailed,
    /// Audit sink rejected a record; the query result is unaffected
    AuditWriteFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ProjectionRegistered => "PROJECTION_REGISTERED",
            Event::QueryReceived => "QUERY_RECEIVED",
            Event::QueryValidated => "QUERY_VALIDATED",
            Event::QueryBlocked => "QUERY_BLOCKED",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::QueryFailed => "QUERY_FAILED",
            Event::QueryTimeout => "QUERY_TIMEOUT",
            Event::CursorDecodeFailed => "CURSOR_DECODE_FAILED",
            Event::CountFailed => "COUNT_FAILED",
            Event::AuditWriteFailed => "AUDIT_WRITE_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryReceived | Event::QueryValidated => Severity::Trace,
            Event::ConfigLoaded | Event::ProjectionRegistered | Event::QueryExecuted => {
                Severity::Info
            }
            Event::QueryBlocked
            | Event::CursorDecodeFailed
            | Event::CountFailed
            | Event::AuditWriteFailed => Severity::Warn,
            Event::QueryFailed | Event::QueryTimeout => Severity::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
