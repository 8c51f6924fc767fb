//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Lock-free counters
//! - Begin/complete scopes with timing
//! - Append-only audit trail of blocked, executed and failed queries
//!
//! Observability is read-only with respect to query execution: a failure
//! here never changes or fails a query result.
//!
//! # Usage
//!
//! ```ignore
//! use aeroquery::observability::{log_event, Event, MetricsRegistry};
//!
//! log_event(Event::QueryBlocked, &[("entity", "user")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.record_blocked(true);
//! ```

pub mod audit;
mod events;
mod logger;
mod metrics;
mod scope;

pub use audit::{AuditAction, AuditLog, AuditOutcome, AuditRecord, FileAuditLog, MemoryAuditLog};
pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

/// Log an event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
