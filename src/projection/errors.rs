//! Projection registration errors
//!
//! Error codes:
//! - AERO_PROJECTION_EMPTY
//! - AERO_PROJECTION_IDENTITY
//! - AERO_PROJECTION_UNKNOWN_SOURCE
//! - AERO_PROJECTION_DUPLICATE_TARGET
//! - AERO_PROJECTION_ALREADY_REGISTERED

use thiserror::Error;

pub type ProjectionResult<T> = Result<T, ProjectionError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("Projection from {entity} to {target} binds no members")]
    EmptyBinding { entity: String, target: String },

    #[error("Projection from {entity} to {target} does not bind identity field '{identity}'")]
    IdentityNotProjected {
        entity: String,
        target: String,
        identity: String,
    },

    #[error("Projection from {entity} binds unknown source field '{field}'")]
    UnknownSourceField { entity: String, field: String },

    #[error("Target member '{0}' is bound more than once")]
    DuplicateTarget(String),

    #[error("Projection from {entity} to {target} is already registered")]
    AlreadyRegistered { entity: String, target: String },
}

impl ProjectionError {
    pub fn code(&self) -> &'static str {
        match self {
            ProjectionError::EmptyBinding { .. } => "AERO_PROJECTION_EMPTY",
            ProjectionError::IdentityNotProjected { .. } => "AERO_PROJECTION_IDENTITY",
            ProjectionError::UnknownSourceField { .. } => "AERO_PROJECTION_UNKNOWN_SOURCE",
            ProjectionError::DuplicateTarget(_) => "AERO_PROJECTION_DUPLICATE_TARGET",
            ProjectionError::AlreadyRegistered { .. } => "AERO_PROJECTION_ALREADY_REGISTERED",
        }
    }
}
