//! Query model subsystem
//!
//! The wire contract for abstract queries, the operator vocabularies they are
//! parsed into, the fluent builder used by clients, and the response envelope.

mod builder;
mod model;
mod operator;
mod response;

pub use builder::{BuilderError, BuilderResult, ConditionBuilder, QueryBuilder, DEFAULT_MAX_PAGE_SIZE};
pub use model::{
    AbstractQuery, AggregationSpecification, FilterCondition, FilterGroup, FilterLeaf,
    GroupBySpecification, JoinSpecification, PageRequest, QueryHints, QueryOperation,
    SortSpecification,
};
pub use operator::{
    AggregateFunction, FilterOperator, JoinKind, LogicalOperator, OperationKind, SortDirection,
};
pub use response::{PageInfo, QueryResponse, ResponseMeta};
