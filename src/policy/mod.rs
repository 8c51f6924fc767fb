//! Entity policy subsystem
//!
//! Static, per-entity whitelists of filterable, sortable and selectable
//! fields with optional per-field operator restrictions, plus the global
//! guardrail limits (filter depth and node count, page size, timeout).

mod config;
mod entity;
mod errors;

pub use config::{
    PolicyFile, ValidationConfig, DEFAULT_EXECUTION_TIMEOUT_SECS, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_NODES, DEFAULT_MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE,
};
pub use entity::EntityConfiguration;
pub use errors::{PolicyError, PolicyResult};
