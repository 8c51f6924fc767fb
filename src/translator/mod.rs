//! Query Translator subsystem for aeroquery
//!
//! Consumes validated queries and produces deterministic pages.
//!
//! # Execution Flow (strict order)
//!
//! 1. Resolve entity schema and projection binding
//! 2. Compile filters to a [`Predicate`] and push it down to storage
//! 3. Joins, then pre-projection operations
//! 4. Sort on source fields and project, or group and sort the groups
//! 5. Post-projection operations, cursor paging on source key values
//!
//! Unknown entities, missing bindings, unsupported operators and
//! malformed operation targets fail the request. Nothing is skipped.

mod errors;
mod filters;
mod grouping;
mod joins;
mod operations;
mod predicate;
mod sorter;
mod translator;

pub use errors::{QueryError, QueryResult};
pub use filters::PredicateFilter;
pub use grouping::GroupedRows;
pub use predicate::{CompareOp, Predicate, PredicateCompiler, Scalar, TextOp};
pub use sorter::{ResultSorter, SortKey};
pub use translator::QueryTranslator;
