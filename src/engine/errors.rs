//! Engine entry-point errors
//!
//! Error codes:
//! - AERO_ENGINE_REJECTED
//! - AERO_ENGINE_TIMEOUT
//! - AERO_ENGINE_TASK
//! - AERO_ENGINE_POLICY_ENTITY
//! - AERO_ENGINE_POLICY_FIELD
//! - AERO_QUERY_* (translation failures pass their own code through)

use std::time::Duration;

use thiserror::Error;

use crate::translator::QueryError;
use crate::validation::ValidationResult;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Validation failed; the query never reached storage
    #[error("Query rejected: {}", .0.summary())]
    Rejected(ValidationResult),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Query exceeded execution timeout of {0:?}")]
    Timeout(Duration),

    #[error("Execution task failed: {0}")]
    Task(String),

    #[error("Policy entity '{0}' has no storage schema")]
    PolicyEntity(String),

    #[error("Policy for {entity} whitelists '{field}', which the schema does not declare")]
    PolicyField { entity: String, field: String },
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Rejected(_) => "AERO_ENGINE_REJECTED",
            EngineError::Query(err) => err.code(),
            EngineError::Timeout(_) => "AERO_ENGINE_TIMEOUT",
            EngineError::Task(_) => "AERO_ENGINE_TASK",
            EngineError::PolicyEntity(_) => "AERO_ENGINE_POLICY_ENTITY",
            EngineError::PolicyField { .. } => "AERO_ENGINE_POLICY_FIELD",
        }
    }

    /// Validation result of a rejected query
    pub fn validation(&self) -> Option<&ValidationResult> {
        match self {
            EngineError::Rejected(result) => Some(result),
            _ => None,
        }
    }
}
