//! Validation service
//!
//! The security boundary between client-authored queries and storage.
//! `QueryValidator::validate` returns every violation at once;
//! `QueryValidator::accept` is the only way to obtain a [`ValidatedQuery`],
//! which is the only input the translator takes.

mod result;
mod validator;

pub use result::{FieldPurpose, ValidatedQuery, ValidationError, ValidationResult};
pub use validator::QueryValidator;

pub(crate) use validator::parse_predicate;
