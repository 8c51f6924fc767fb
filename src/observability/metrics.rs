//! Query metrics
//!
//! Counters only, monotonic, reset on process start. Lock-free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Operational counters of the query engine
///
/// Relaxed ordering throughout; counters are independent of each other.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_validated: AtomicU64,
    queries_executed: AtomicU64,
    queries_blocked: AtomicU64,
    queries_failed: AtomicU64,
    queries_timed_out: AtomicU64,
    /// Blocked queries that breached a whitelist or limit
    guardrail_violations: AtomicU64,
    cursor_decode_failures: AtomicU64,
    count_failures: AtomicU64,
    rows_examined: AtomicU64,
    rows_returned: AtomicU64,
    /// Cumulative execution latency in microseconds
    latency_micros: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_validated(&self) {
        self.queries_validated.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful execution
    pub fn record_executed(&self, rows_examined: u64, rows_returned: u64, elapsed: Duration) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
        self.rows_examined.fetch_add(rows_examined, Ordering::Relaxed);
        self.rows_returned.fetch_add(rows_returned, Ordering::Relaxed);
        self.add_latency(elapsed);
    }

    /// Records a blocked query
    pub fn record_blocked(&self, guardrail_violation: bool) {
        self.queries_blocked.fetch_add(1, Ordering::Relaxed);
        if guardrail_violation {
            self.guardrail_violations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_failed(&self, elapsed: Duration) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
        self.add_latency(elapsed);
    }

    pub fn increment_timed_out(&self) {
        self.queries_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cursor_decode_failures(&self) {
        self.cursor_decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_count_failures(&self) {
        self.count_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn add_latency(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.latency_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_validated: self.queries_validated.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_blocked: self.queries_blocked.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            queries_timed_out: self.queries_timed_out.load(Ordering::Relaxed),
            guardrail_violations: self.guardrail_violations.load(Ordering::Relaxed),
            cursor_decode_failures: self.cursor_decode_failures.load(Ordering::Relaxed),
            count_failures: self.count_failures.load(Ordering::Relaxed),
            rows_examined: self.rows_examined.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            latency_micros: self.latency_micros.load(Ordering::Relaxed),
        }
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_validated: u64,
    pub queries_executed: u64,
    pub queries_blocked: u64,
    pub queries_failed: u64,
    pub queries_timed_out: u64,
    pub guardrail_violations: u64,
    pub cursor_decode_failures: u64,
    pub count_failures: u64,
    pub rows_examined: u64,
    pub rows_returned: u64,
    pub latency_micros: u64,
}
