//! Storage collaborator errors

use std::io;

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("Entity '{0}' is registered more than once")]
    DuplicateEntity(String),

    #[error("Entity '{entity}' identity field '{field}' is missing or not scalar")]
    InvalidIdentity { entity: String, field: String },

    #[error("Field '{field}' on {entity} does not conform to type {expected}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: &'static str,
    },

    #[error("Invalid record for {entity}: {reason}")]
    InvalidRecord { entity: String, reason: String },

    #[error("Storage call cancelled")]
    Cancelled,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read data file: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid data file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::UnknownEntity(_) => "AERO_STORAGE_UNKNOWN_ENTITY",
            StorageError::DuplicateEntity(_) => "AERO_STORAGE_DUPLICATE_ENTITY",
            StorageError::InvalidIdentity { .. } => "AERO_STORAGE_INVALID_IDENTITY",
            StorageError::TypeMismatch { .. } => "AERO_STORAGE_TYPE_MISMATCH",
            StorageError::InvalidRecord { .. } => "AERO_STORAGE_INVALID_RECORD",
            StorageError::Cancelled => "AERO_STORAGE_CANCELLED",
            StorageError::Unavailable(_) => "AERO_STORAGE_UNAVAILABLE",
            StorageError::Io(_) => "AERO_STORAGE_IO",
            StorageError::Parse(_) => "AERO_STORAGE_PARSE",
        }
    }
}
