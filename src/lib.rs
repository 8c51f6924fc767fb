//! aeroquery - A guarded, projection-first abstract query engine
//!
//! Clients describe queries as data (`query`). Every query is checked
//! against a per-entity whitelist (`policy`, `validation`) before it is
//! compiled into a typed predicate, pushed down to storage and shaped
//! through a declared projection (`translator`, `projection`). Results come
//! back one page at a time with a resumable cursor (`paging`).
//!
//! `engine::QueryEngine` is the entry point; `cli` wraps it for operators.

pub mod cli;
pub mod engine;
pub mod observability;
pub mod paging;
pub mod policy;
pub mod projection;
pub mod query;
pub mod schema;
pub mod storage;
pub mod translator;
pub mod validation;
