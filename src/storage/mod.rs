//! Storage collaborator for aeroquery
//!
//! The engine never reads entity rows directly. It hands a compiled
//! [`Predicate`] to a [`StorageProvider`] and receives declared-field
//! records back, so filtering can be pushed down to whatever backs the
//! provider.
//!
//! # Contract
//!
//! - `scan` returns matching records in a stable (insertion) order
//! - Records carry only the fields the entity schema declares
//! - Cancellation is observed between rows; a cancelled scan yields
//!   [`StorageError::Cancelled`] and no partial result

mod errors;
mod memory;

use tokio_util::sync::CancellationToken;

use crate::schema::{EntitySchema, Record};
use crate::translator::Predicate;

pub use errors::{StorageError, StorageResult};
pub use memory::MemoryStorage;

/// Rows matched by one scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutput {
    pub records: Vec<Record>,
    /// Rows the provider had to look at to produce `records`
    pub rows_examined: u64,
}

/// Source of entity records
pub trait StorageProvider: Send + Sync {
    /// Schema of `entity` (case-insensitive)
    fn schema(&self, entity: &str) -> Option<EntitySchema>;

    /// Names of every entity this provider serves
    fn entities(&self) -> Vec<String>;

    /// Returns every record of `entity` satisfying `predicate`
    fn scan(
        &self,
        entity: &str,
        predicate: &Predicate,
        cancel: &CancellationToken,
    ) -> StorageResult<ScanOutput>;

    /// Counts records of `entity` satisfying `predicate`
    fn count(
        &self,
        entity: &str,
        predicate: &Predicate,
        cancel: &CancellationToken,
    ) -> StorageResult<u64> {
        self.scan(entity, predicate, cancel)
            .map(|out| out.records.len() as u64)
    }
}
