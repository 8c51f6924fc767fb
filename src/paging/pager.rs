//! Keyset pagination over ordered rows
//!
//! Rows arrive sorted by `keys`. A cursor resumes strictly after the row it
//! was taken from, comparing the full key tuple with each key's direction,
//! so pages never overlap or skip rows while the keys stay unique. A cursor
//! that cannot be decoded is logged and paging restarts at the first page.

use std::cmp::Ordering;

use crate::observability::{log_event, Event, MetricsRegistry};
use crate::schema::Record;
use crate::translator::SortKey;

use super::cursor::CursorPayload;

/// Rows of one page plus the cursor to the next
#[derive(Debug, Clone, PartialEq)]
pub struct PagedRecords<R = Record> {
    pub records: Vec<R>,
    pub next_cursor: Option<String>,
}

pub struct Pager<'a> {
    keys: &'a [SortKey],
    size: u32,
    metrics: Option<&'a MetricsRegistry>,
}

impl<'a> Pager<'a> {
    pub fn new(keys: &'a [SortKey], size: u32) -> Self {
        Self {
            keys,
            size,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<&'a MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Decodes `cursor`; `None` (start from the first page) when unusable
    pub fn resume_point(&self, cursor: Option<&str>, entity: &str) -> Option<CursorPayload> {
        let cursor = cursor.filter(|c| !c.trim().is_empty())?;
        match CursorPayload::decode_for(cursor, self.keys) {
            Ok(payload) => Some(payload),
            Err(err) => {
                let message = err.to_string();
                log_event(
                    Event::CursorDecodeFailed,
                    &[("entity", entity), ("code", err.code()), ("error", message.as_str())],
                );
                if let Some(metrics) = self.metrics {
                    metrics.increment_cursor_decode_failures();
                }
                None
            }
        }
    }

    /// Slices one page out of sorted `rows`
    pub fn apply(&self, rows: Vec<Record>, cursor: Option<&str>, entity: &str) -> PagedRecords {
        self.apply_keyed(rows, cursor, entity, |row| row)
    }

    /// Slices one page out of sorted `rows` whose key columns live in
    /// `keyed(row)` rather than in the row itself
    pub fn apply_keyed<R>(
        &self,
        rows: Vec<R>,
        cursor: Option<&str>,
        entity: &str,
        keyed: impl Fn(&R) -> &Record,
    ) -> PagedRecords<R> {
        let after = self.resume_point(cursor, entity);
        let size = self.size as usize;

        // Fetch size + 1 to detect a further page
        let mut records: Vec<R> = rows
            .into_iter()
            .filter(|row| match &after {
                Some(payload) => self.is_after(keyed(row), payload),
                None => true,
            })
            .take(size + 1)
            .collect();

        let next_cursor = if records.len() > size {
            records.truncate(size);
            records
                .last()
                .map(|last| CursorPayload::from_record(keyed(last), self.keys).encode())
        } else {
            None
        };

        PagedRecords {
            records,
            next_cursor,
        }
    }

    /// True when `row` orders strictly after the cursor's key tuple
    fn is_after(&self, row: &Record, cursor: &CursorPayload) -> bool {
        let ordering = self
            .keys
            .iter()
            .map(|key| key.compare(row.get(&key.field), cursor.value(&key.field)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal);
        ordering == Ordering::Greater
    }
}
