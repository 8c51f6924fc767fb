//! Query engine for aeroquery
//!
//! Ties validation, translation, metrics and audit together behind the two
//! calls an application makes: `validate` and `execute`.

mod errors;
mod query_engine;

pub use errors::{EngineError, EngineResult};
pub use query_engine::QueryEngine;
