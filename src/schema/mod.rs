//! Entity schema subsystem
//!
//! Declared field types and the per-entity accessor tables that turn typed
//! rows into [`Record`]s. Validation and translation only ever consult the
//! schema, never the concrete row type.

mod accessor;
mod types;

pub use accessor::{AccessorTable, EntitySchema, Record, DEFAULT_IDENTITY_FIELD};
pub use types::FieldType;
