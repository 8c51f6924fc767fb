//! Translation and execution errors
//!
//! Error codes:
//! - AERO_QUERY_UNKNOWN_ENTITY
//! - AERO_QUERY_MISSING_PROJECTION
//! - AERO_QUERY_UNSUPPORTED_OPERATOR
//! - AERO_QUERY_UNKNOWN_FIELD
//! - AERO_QUERY_INVALID_OPERATION
//! - AERO_QUERY_INVALID_VALUE
//! - AERO_QUERY_SORT_NOT_PROJECTED
//! - AERO_QUERY_STORAGE
//! - AERO_QUERY_CANCELLED
//! - AERO_QUERY_MATERIALIZATION
//!
//! Every variant fails the request. None of them may be swallowed: an
//! ignored operator or field silently changes which rows are visible.

use thiserror::Error;

use crate::storage::StorageError;

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("No projection registered from {entity} to {target}")]
    MissingProjection { entity: String, target: &'static str },

    #[error("Unsupported operator '{0}'")]
    UnsupportedOperator(String),

    #[error("Unknown field '{field}' on {entity}")]
    UnknownField { entity: String, field: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid value for field '{field}': expected {expected}")]
    InvalidValue { field: String, expected: String },

    #[error("Sort field '{0}' is not part of the projection")]
    SortFieldNotProjected(String),

    #[error("Storage failure: {0}")]
    Storage(StorageError),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Failed to materialize result: {0}")]
    Materialization(#[source] serde_json::Error),
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::UnknownEntity(_) => "AERO_QUERY_UNKNOWN_ENTITY",
            QueryError::MissingProjection { .. } => "AERO_QUERY_MISSING_PROJECTION",
            QueryError::UnsupportedOperator(_) => "AERO_QUERY_UNSUPPORTED_OPERATOR",
            QueryError::UnknownField { .. } => "AERO_QUERY_UNKNOWN_FIELD",
            QueryError::InvalidOperation(_) => "AERO_QUERY_INVALID_OPERATION",
            QueryError::InvalidValue { .. } => "AERO_QUERY_INVALID_VALUE",
            QueryError::SortFieldNotProjected(_) => "AERO_QUERY_SORT_NOT_PROJECTED",
            QueryError::Storage(_) => "AERO_QUERY_STORAGE",
            QueryError::Cancelled => "AERO_QUERY_CANCELLED",
            QueryError::Materialization(_) => "AERO_QUERY_MATERIALIZATION",
        }
    }

    pub(crate) fn invalid_value(field: &str, expected: impl Into<String>) -> Self {
        QueryError::InvalidValue {
            field: field.to_string(),
            expected: expected.into(),
        }
    }
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Cancelled => QueryError::Cancelled,
            StorageError::UnknownEntity(entity) => QueryError::UnknownEntity(entity),
            other => QueryError::Storage(other),
        }
    }
}
