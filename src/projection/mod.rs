//! Projection-first result shaping
//!
//! Results are built from a declared binding, member by member. Internal
//! fields a binding does not name are unreachable from any response.

mod binding;
mod errors;
mod registry;

pub use binding::{BindingMember, ProjectionBinding};
pub use errors::{ProjectionError, ProjectionResult};
pub use registry::ProjectionRegistry;
