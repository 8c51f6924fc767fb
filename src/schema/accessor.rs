//! Compiled field accessor tables
//!
//! Built once per entity at startup. A table maps each declared field name
//! to its type and a getter; only declared fields ever reach a [`Record`],
//! so a field absent from the table cannot be filtered, sorted or returned.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::FieldType;

/// One materialized row: declared field name to JSON value
pub type Record = Map<String, Value>;

pub const DEFAULT_IDENTITY_FIELD: &str = "Id";

fn default_identity() -> String {
    DEFAULT_IDENTITY_FIELD.to_string()
}

/// Type-erased description of an entity: its fields and identity key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    name: String,
    #[serde(default = "default_identity")]
    identity: String,
    #[serde(default)]
    fields: BTreeMap<String, FieldType>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: default_identity(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_identity(mut self, field: impl Into<String>) -> Self {
        self.identity = field.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lookup key (lowercase name)
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Unique, scalar field used as the final cursor tie-breaker
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldType> {
        &self.fields
    }

    pub fn field_type(&self, field: &str) -> Option<&FieldType> {
        self.fields.get(field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// True when the identity field is declared and scalar
    pub fn has_valid_identity(&self) -> bool {
        self.field_type(&self.identity)
            .map(FieldType::is_scalar)
            .unwrap_or(false)
    }

    /// Keeps only declared fields; reports the first non-conforming value
    pub fn conform(&self, mut record: Record) -> Result<Record, (String, &'static str)> {
        record.retain(|k, _| self.fields.contains_key(k));
        for (field, field_type) in &self.fields {
            match record.get(field) {
                Some(value) if !field_type.conforms(value) => {
                    return Err((field.clone(), field_type.type_name()));
                }
                Some(_) => {}
                None => {
                    record.insert(field.clone(), Value::Null);
                }
            }
        }
        Ok(record)
    }
}

type Getter<E> = Box<dyn Fn(&E) -> Value + Send + Sync>;

/// Typed accessor table for entity type `E`
///
/// ```ignore
/// let users = AccessorTable::<User>::new("User")
///     .field("Id", FieldType::Int, |u| json!(u.id))
///     .field("Name", FieldType::String, |u| json!(u.name));
/// ```
pub struct AccessorTable<E> {
    schema: EntitySchema,
    getters: Vec<(String, Getter<E>)>,
}

impl<E> AccessorTable<E> {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            schema: EntitySchema::new(entity),
            getters: Vec::new(),
        }
    }

    /// Overrides the identity field (default `Id`)
    pub fn identity(mut self, field: impl Into<String>) -> Self {
        self.schema.identity = field.into();
        self
    }

    /// Declares a field; a later declaration with the same name replaces it
    pub fn field<F>(mut self, name: impl Into<String>, field_type: FieldType, getter: F) -> Self
    where
        F: Fn(&E) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        self.getters.retain(|(n, _)| *n != name);
        self.schema.fields.insert(name.clone(), field_type);
        self.getters.push((name, Box::new(getter)));
        self
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Reads one field by name
    pub fn get(&self, item: &E, field: &str) -> Option<Value> {
        self.getters
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, getter)| getter(item))
    }

    /// Materializes every declared field of `item`
    pub fn to_record(&self, item: &E) -> Record {
        self.getters
            .iter()
            .map(|(name, getter)| (name.clone(), getter(item)))
            .collect()
    }
}

impl<E> fmt::Debug for AccessorTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorTable")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
