//! Opaque page cursor
//!
//! Wire form: standard base64 of `{"values":{...},"timestamp":null}`.
//! `values` holds the boundary row's value for every ordering key.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::Record;
use crate::translator::SortKey;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("cursor is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("cursor payload is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cursor is missing key '{0}'")]
    MissingKey(String),
}

impl CursorError {
    pub fn code(&self) -> &'static str {
        match self {
            CursorError::Base64(_) => "AERO_CURSOR_BASE64",
            CursorError::Utf8(_) => "AERO_CURSOR_UTF8",
            CursorError::Json(_) => "AERO_CURSOR_JSON",
            CursorError::MissingKey(_) => "AERO_CURSOR_MISSING_KEY",
        }
    }
}

/// Decoded cursor payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPayload {
    pub values: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CursorPayload {
    /// Captures the key values of the boundary row
    pub fn from_record(record: &Record, keys: &[SortKey]) -> Self {
        let values = keys
            .iter()
            .map(|k| {
                let value = record.get(&k.field).cloned().unwrap_or(Value::Null);
                (k.field.clone(), value)
            })
            .collect();
        Self {
            values,
            timestamp: None,
        }
    }

    pub fn encode(&self) -> String {
        // Map and Option<DateTime> serialization cannot fail
        let json = serde_json::to_string(self).unwrap_or_default();
        STANDARD.encode(json.as_bytes())
    }

    pub fn decode(cursor: &str) -> Result<Self, CursorError> {
        let bytes = STANDARD.decode(cursor.trim())?;
        let json = String::from_utf8(bytes)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Decodes and checks that every key is present
    pub fn decode_for(cursor: &str, keys: &[SortKey]) -> Result<Self, CursorError> {
        let payload = Self::decode(cursor)?;
        if let Some(missing) = keys.iter().find(|k| !payload.values.contains_key(&k.field)) {
            return Err(CursorError::MissingKey(missing.field.clone()));
        }
        Ok(payload)
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }
}
