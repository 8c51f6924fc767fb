//! Query audit trail
//!
//! - Every blocked, executed and failed query is recorded
//! - Append-only; the file log syncs each record before returning
//! - One JSON record per line
//! - Audit failures are logged by the caller and never fail a query

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// What happened to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// Rejected by validation, never translated
    QueryBlocked,
    QueryExecuted,
    /// Translation, storage or deadline failure
    QueryFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::QueryBlocked => "QUERY_BLOCKED",
            AuditAction::QueryExecuted => "QUERY_EXECUTED",
            AuditAction::QueryFailed => "QUERY_FAILED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for AuditAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "SUCCESS",
            AuditOutcome::Rejected => "REJECTED",
            AuditOutcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for AuditOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A single audit record
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub id: Uuid,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    /// Entity as requested by the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Validation messages or the failure message
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    /// Set when a blocked query breached a guardrail
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub security_event: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_us: Option<u64>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            outcome,
            entity: None,
            reasons: Vec::new(),
            security_event: false,
            error_code: None,
            rows_returned: None,
            elapsed_us: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_reasons(mut self, reasons: Vec<String>) -> Self {
        self.reasons = reasons;
        self
    }

    pub fn with_security_event(mut self, security_event: bool) -> Self {
        self.security_event = security_event;
        self
    }

    pub fn with_error(mut self, code: &str, message: impl Into<String>) -> Self {
        self.error_code = Some(code.to_string());
        self.reasons.push(message.into());
        self
    }

    pub fn with_rows_returned(mut self, rows: u64) -> Self {
        self.rows_returned = Some(rows);
        self
    }

    pub fn with_elapsed_us(mut self, elapsed_us: u64) -> Self {
        self.elapsed_us = Some(elapsed_us);
        self
    }

    /// Serialize to a JSON line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"id":"{}","action":"{}","outcome":"{}"}}"#,
                self.id, self.action, self.outcome
            )
        })
    }
}

/// Append-only audit sink
pub trait AuditLog: Send + Sync {
    /// Append a record; it must be visible once this returns
    fn append(&self, record: &AuditRecord) -> io::Result<()>;

    fn sync(&self) -> io::Result<()>;
}

/// JSON-lines audit file, synced after every record
pub struct FileAuditLog {
    path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl FileAuditLog {
    /// Open or create an audit log file
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "audit log lock poisoned")
}

impl AuditLog for FileAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        let json = record.to_json();
        let mut writer = self.writer.lock().map_err(|_| poisoned())?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    fn sync(&self) -> io::Result<()> {
        let writer = self.writer.lock().map_err(|_| poisoned())?;
        writer.get_ref().sync_all()
    }
}

/// In-memory audit log
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        self.records
            .lock()
            .map_err(|_| poisoned())?
            .push(record.clone());
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_audit_record_json() {
        let record = AuditRecord::new(AuditAction::QueryBlocked, AuditOutcome::Rejected)
            .with_entity("user")
            .with_reasons(vec!["Field 'PasswordHash' is not allowed for filtering on User".into()])
            .with_security_event(true);

        let parsed: serde_json::Value = serde_json::from_str(&record.to_json()).unwrap();
        assert_eq!(parsed["action"], "QUERY_BLOCKED");
        assert_eq!(parsed["outcome"], "REJECTED");
        assert_eq!(parsed["entity"], "user");
        assert_eq!(parsed["security_event"], true);
        assert!(parsed["reasons"][0].as_str().unwrap().contains("PasswordHash"));
        assert!(parsed.get("rows_returned").is_none());
    }

    #[test]
    fn test_memory_audit_log() {
        let log = MemoryAuditLog::new();
        assert!(log.is_empty());

        log.append(&AuditRecord::new(AuditAction::QueryExecuted, AuditOutcome::Success))
            .unwrap();
        log.append(&AuditRecord::new(AuditAction::QueryFailed, AuditOutcome::Failed))
            .unwrap();

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, AuditAction::QueryExecuted);
        assert_eq!(records[1].outcome, AuditOutcome::Failed);
    }

    #[test]
    fn test_file_audit_log_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = FileAuditLog::open(&path).unwrap();

        log.append(
            &AuditRecord::new(AuditAction::QueryExecuted, AuditOutcome::Success)
                .with_entity("order")
                .with_rows_returned(3),
        )
        .unwrap();
        log.append(
            &AuditRecord::new(AuditAction::QueryFailed, AuditOutcome::Failed)
                .with_error("AERO_QUERY_MISSING_PROJECTION", "no binding"),
        )
        .unwrap();
        log.sync().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["rows_returned"], 3);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["error_code"], "AERO_QUERY_MISSING_PROJECTION");
    }
}
