//! Field type definitions
//!
//! Supported types:
//! - string: UTF-8 string
//! - int: 64-bit signed integer
//! - float: 64-bit floating point
//! - bool: Boolean
//! - datetime: RFC 3339 timestamp string
//! - uuid: hyphenated UUID string
//! - object: nested object with field schema
//! - array: homogeneous array with element type
//!
//! Every field is nullable; `null` conforms to any type.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    Uuid,
    Object {
        fields: BTreeMap<String, FieldType>,
    },
    Array {
        #[serde(rename = "element_type")]
        element_type: Box<FieldType>,
    },
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::DateTime => "datetime",
            FieldType::Uuid => "uuid",
            FieldType::Object { .. } => "object",
            FieldType::Array { .. } => "array",
        }
    }

    pub fn array_of(element: FieldType) -> Self {
        FieldType::Array {
            element_type: Box::new(element),
        }
    }

    pub fn object<S: Into<String>>(fields: impl IntoIterator<Item = (S, FieldType)>) -> Self {
        FieldType::Object {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Comparable with `eq`/`lt`/... and usable as a sort or cursor key
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Object { .. } | FieldType::Array { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    /// Element type of an array field
    pub fn element(&self) -> Option<&FieldType> {
        match self {
            FieldType::Array { element_type } => Some(element_type),
            _ => None,
        }
    }

    /// Member fields of an object, or of an array's object elements
    pub fn member_fields(&self) -> Option<&BTreeMap<String, FieldType>> {
        match self {
            FieldType::Object { fields } => Some(fields),
            FieldType::Array { element_type } => element_type.member_fields(),
            _ => None,
        }
    }

    /// Checks a JSON value against this type, recursively
    pub fn conforms(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Int, Value::Number(n)) => n.is_i64(),
            (FieldType::Float, Value::Number(_)) => true,
            (FieldType::Bool, Value::Bool(_)) => true,
            (FieldType::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(s).is_ok(),
            (FieldType::Uuid, Value::String(s)) => Uuid::parse_str(s).is_ok(),
            (FieldType::Object { fields }, Value::Object(map)) => map
                .iter()
                .all(|(k, v)| fields.get(k).map(|t| t.conforms(v)).unwrap_or(false)),
            (FieldType::Array { element_type }, Value::Array(items)) => {
                items.iter().all(|item| element_type.conforms(item))
            }
            _ => false,
        }
    }
}
