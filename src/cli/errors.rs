//! CLI-specific error types
//!
//! Subsystem errors keep their own codes; the CLI only adds codes for
//! its own I/O.

use std::io;

use thiserror::Error;

use crate::engine::EngineError;
use crate::policy::PolicyError;
use crate::projection::ProjectionError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Policy(#[from] PolicyError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Projection(#[from] ProjectionError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    /// Configured projection for an entity the data file does not define
    #[error("Projection configured for '{0}', which storage does not define")]
    UnknownProjectionEntity(String),

    #[error("Invalid query JSON: {0}")]
    InvalidQuery(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Policy(err) => err.code(),
            CliError::Storage(err) => err.code(),
            CliError::Projection(err) => err.code(),
            CliError::Engine(err) => err.code(),
            CliError::UnknownProjectionEntity(_) => "AERO_CLI_UNKNOWN_PROJECTION_ENTITY",
            CliError::InvalidQuery(_) => "AERO_CLI_INVALID_QUERY",
            CliError::Io(_) => "AERO_CLI_IO_ERROR",
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(format!("JSON error: {}", e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through() {
        let err = CliError::from(StorageError::UnknownEntity("Invoice".into()));
        assert_eq!(err.code(), "AERO_STORAGE_UNKNOWN_ENTITY");
        assert_eq!(CliError::InvalidQuery("eof".into()).code(), "AERO_CLI_INVALID_QUERY");
    }

    #[test]
    fn test_io_conversion() {
        let err: CliError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code(), "AERO_CLI_IO_ERROR");
        assert!(err.to_string().contains("gone"));
    }
}
