//! Policy configuration errors

use thiserror::Error;

pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors raised while loading or assembling a validation policy.
///
/// All policy errors are startup errors: a process with an invalid policy
/// must not serve queries.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid policy JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Entity configuration has an empty name")]
    EmptyEntityName,

    #[error("Entity '{0}' is configured more than once")]
    DuplicateEntity(String),

    #[error("Projection for unknown entity '{0}'")]
    UnknownProjectionEntity(String),
}

impl PolicyError {
    pub fn code(&self) -> &'static str {
        match self {
            PolicyError::Io(_) => "AERO_POLICY_IO",
            PolicyError::Parse(_) => "AERO_POLICY_PARSE",
            PolicyError::InvalidLimit(_) => "AERO_POLICY_INVALID_LIMIT",
            PolicyError::EmptyEntityName => "AERO_POLICY_EMPTY_ENTITY",
            PolicyError::DuplicateEntity(_) => "AERO_POLICY_DUPLICATE_ENTITY",
            PolicyError::UnknownProjectionEntity(_) => "AERO_POLICY_UNKNOWN_PROJECTION_ENTITY",
        }
    }
}
