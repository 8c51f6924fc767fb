//! In-memory storage provider
//!
//! Tables are keyed by lowercase entity name. Every inserted record is
//! conformed to the entity schema first, so undeclared fields never enter
//! the store and identity values are unique per table.
//!
//! Data file format:
//!
//! ```json
//! {
//!   "entities": [
//!     {
//!       "name": "User",
//!       "identity": "Id",
//!       "fields": { "Id": { "type": "int" }, "Name": { "type": "string" } },
//!       "records": [ { "Id": 1, "Name": "Ada" } ]
//!     }
//!   ]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::observability::ObservationScope;
use crate::schema::{AccessorTable, EntitySchema, Record};
use crate::translator::{Predicate, PredicateFilter};

use super::errors::{StorageError, StorageResult};
use super::{ScanOutput, StorageProvider};

#[derive(Debug)]
struct Table {
    schema: EntitySchema,
    records: Vec<Record>,
    identities: HashSet<String>,
}

impl Table {
    fn new(schema: EntitySchema) -> StorageResult<Self> {
        if !schema.has_valid_identity() {
            return Err(StorageError::InvalidIdentity {
                entity: schema.name().to_string(),
                field: schema.identity().to_string(),
            });
        }
        Ok(Self {
            schema,
            records: Vec::new(),
            identities: HashSet::new(),
        })
    }

    fn insert(&mut self, record: Record) -> StorageResult<()> {
        let entity = self.schema.name().to_string();
        let record = self
            .schema
            .conform(record)
            .map_err(|(field, expected)| StorageError::TypeMismatch {
                entity: entity.clone(),
                field,
                expected,
            })?;

        let identity = match record.get(self.schema.identity()) {
            Some(value) if !value.is_null() => value.to_string(),
            _ => {
                return Err(StorageError::InvalidIdentity {
                    entity,
                    field: self.schema.identity().to_string(),
                })
            }
        };
        if !self.identities.insert(identity.clone()) {
            return Err(StorageError::InvalidRecord {
                entity,
                reason: format!("duplicate identity {}", identity),
            });
        }
        self.records.push(record);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DataFile {
    #[serde(default)]
    entities: Vec<EntityData>,
}

#[derive(Debug, Deserialize)]
struct EntityData {
    #[serde(flatten)]
    schema: EntitySchema,
    #[serde(default)]
    records: Vec<Record>,
}

/// Thread-safe in-memory [`StorageProvider`]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads schemas and records from a JSON data file
    pub fn load(path: &Path) -> StorageResult<Self> {
        let path_str = path.display().to_string();
        let scope = ObservationScope::with_fields("DATA_LOAD", &[("path", path_str.as_str())]);

        let loaded = fs::read_to_string(path)
            .map_err(StorageError::from)
            .and_then(|content| Self::from_json(&content));
        match &loaded {
            Ok(storage) => {
                let entities = storage.entities().len().to_string();
                scope.complete_with_fields(&[("entities", entities.as_str())]);
            }
            Err(err) => scope.fail(err.code()),
        }
        loaded
    }

    pub fn from_json(json: &str) -> StorageResult<Self> {
        let file: DataFile = serde_json::from_str(json)?;
        let storage = Self::new();
        for entity in file.entities {
            let name = entity.schema.name().to_string();
            storage.register_schema(entity.schema)?;
            storage.insert_records(&name, entity.records)?;
        }
        Ok(storage)
    }

    /// Creates an empty table for `schema`
    pub fn register_schema(&self, schema: EntitySchema) -> StorageResult<()> {
        let key = schema.key();
        let table = Table::new(schema)?;
        let mut tables = self.write()?;
        if tables.contains_key(&key) {
            return Err(StorageError::DuplicateEntity(table.schema.name().to_string()));
        }
        tables.insert(key, table);
        Ok(())
    }

    /// Registers a typed entity through its accessor table
    pub fn register<E>(&self, table: &AccessorTable<E>, items: &[E]) -> StorageResult<()> {
        self.register_schema(table.schema().clone())?;
        let records = items.iter().map(|item| table.to_record(item)).collect();
        self.insert_records(table.schema().name(), records)?;
        Ok(())
    }

    /// Appends records to an existing table; all or nothing
    pub fn insert_records(&self, entity: &str, records: Vec<Record>) -> StorageResult<usize> {
        let mut tables = self.write()?;
        let table = tables
            .get_mut(&entity.to_lowercase())
            .ok_or_else(|| StorageError::UnknownEntity(entity.to_string()))?;

        let before = table.records.len();
        let identities = table.identities.clone();
        for record in records {
            if let Err(err) = table.insert(record) {
                table.records.truncate(before);
                table.identities = identities;
                return Err(err);
            }
        }
        Ok(table.records.len() - before)
    }

    /// Number of records stored for `entity`
    pub fn len(&self, entity: &str) -> usize {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(&entity.to_lowercase()).map(|t| t.records.len()))
            .unwrap_or(0)
    }

    fn write(
        &self,
    ) -> StorageResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Table>>> {
        self.tables
            .write()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, HashMap<String, Table>>> {
        self.tables
            .read()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))
    }
}

impl StorageProvider for MemoryStorage {
    fn schema(&self, entity: &str) -> Option<EntitySchema> {
        let tables = self.tables.read().ok()?;
        tables.get(&entity.to_lowercase()).map(|t| t.schema.clone())
    }

    fn entities(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.tables.read() {
            Ok(tables) => tables.values().map(|t| t.schema.name().to_string()).collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    fn scan(
        &self,
        entity: &str,
        predicate: &Predicate,
        cancel: &CancellationToken,
    ) -> StorageResult<ScanOutput> {
        let tables = self.read()?;
        let table = tables
            .get(&entity.to_lowercase())
            .ok_or_else(|| StorageError::UnknownEntity(entity.to_string()))?;

        let mut records = Vec::new();
        for record in &table.records {
            if cancel.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            if PredicateFilter::matches(record, predicate) {
                records.push(record.clone());
            }
        }
        Ok(ScanOutput {
            records,
            rows_examined: table.records.len() as u64,
        })
    }

    fn count(
        &self,
        entity: &str,
        predicate: &Predicate,
        cancel: &CancellationToken,
    ) -> StorageResult<u64> {
        let tables = self.read()?;
        let table = tables
            .get(&entity.to_lowercase())
            .ok_or_else(|| StorageError::UnknownEntity(entity.to_string()))?;

        let mut count = 0u64;
        for record in &table.records {
            if cancel.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            if PredicateFilter::matches(record, predicate) {
                count += 1;
            }
        }
        Ok(count)
    }
}
