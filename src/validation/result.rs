//! Validation outcome types

use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

use crate::query::AbstractQuery;

/// What a whitelisted field is being used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPurpose {
    Filtering,
    Sorting,
    Selection,
    Grouping,
    Aggregation,
}

impl fmt::Display for FieldPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldPurpose::Filtering => "filtering",
            FieldPurpose::Sorting => "sorting",
            FieldPurpose::Selection => "selection",
            FieldPurpose::Grouping => "grouping",
            FieldPurpose::Aggregation => "aggregation",
        };
        f.write_str(s)
    }
}

/// A single rule violation.
///
/// Validation never fails fast: every violation found in a query is
/// collected, and the `Display` text is what clients see on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Entity is required")]
    MissingEntity,

    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("Filter tree depth {depth} exceeds the maximum of {max}")]
    FilterTooDeep { depth: usize, max: usize },

    #[error("Filter tree has {count} nodes, exceeding the maximum of {max}")]
    TooManyFilterNodes { count: usize, max: usize },

    #[error("{context} field name must not be empty")]
    EmptyField { context: &'static str },

    #[error("Field '{field}' is not allowed for {purpose} on {entity}")]
    FieldNotAllowed {
        field: String,
        entity: String,
        purpose: FieldPurpose,
    },

    #[error("Unsupported operator '{operator}' for field '{field}'")]
    UnknownOperator { operator: String, field: String },

    #[error("Operator '{operator}' is not allowed for field '{field}' on {entity}")]
    OperatorNotAllowed {
        operator: String,
        field: String,
        entity: String,
    },

    #[error("Operator '{operator}' requires a value for field '{field}'")]
    ValueRequired { operator: String, field: String },

    #[error("Operator '{operator}' does not accept a value for field '{field}'")]
    ValueForbidden { operator: String, field: String },

    #[error("Filter group must contain at least one condition")]
    EmptyGroup,

    #[error("Unknown logic '{0}', expected 'and' or 'or'")]
    UnknownLogic(String),

    #[error("Invalid sort direction '{direction}' for field '{field}', expected 'asc' or 'desc'")]
    InvalidSortDirection { field: String, direction: String },

    #[error("Page size must be between 1 and {max}, got {got}")]
    PageSizeOutOfRange { max: u32, got: i64 },

    #[error("Unknown operation type '{0}'")]
    UnknownOperation(String),

    #[error("Operation '{operation}' requires parameter '{parameter}'")]
    MissingParameter {
        operation: String,
        parameter: &'static str,
    },

    #[error("Operation '{operation}' requires a non-negative integer 'count', got {value}")]
    InvalidCount { operation: String, value: String },

    #[error("Take count must be at most {max}, got {count}")]
    TakeExceedsMax { count: u64, max: u32 },

    #[error("Operation '{operation}' has an invalid predicate: {reason}")]
    InvalidPredicate { operation: String, reason: String },

    #[error("Having requires at least one GroupBy field")]
    HavingWithoutGroupBy,

    #[error("Aggregations require at least one GroupBy field")]
    AggregationWithoutGroupBy,

    #[error("Having field '{0}' must be a filterable GroupBy field or an aggregation alias")]
    HavingFieldNotAllowed(String),

    #[error("Unknown aggregate function '{0}'")]
    UnknownAggregate(String),

    #[error("Aggregate function '{0}' requires a field")]
    AggregateFieldRequired(String),

    #[error("Duplicate output column '{0}'")]
    DuplicateAlias(String),

    #[error("Join entity is required")]
    JoinEntityRequired,

    #[error("Join on '{0}' requires at least one 'on' field pair")]
    JoinOnRequired(String),

    #[error("Unknown join type '{0}', expected 'join' or 'groupjoin'")]
    UnknownJoinType(String),

    #[error("Unknown join entity '{0}'")]
    UnknownJoinEntity(String),
}

impl ValidationError {
    /// True for whitelist and limit breaches, which are security events
    /// rather than plain shape mistakes.
    pub fn is_guardrail_violation(&self) -> bool {
        matches!(
            self,
            ValidationError::UnknownEntity(_)
                | ValidationError::FilterTooDeep { .. }
                | ValidationError::TooManyFilterNodes { .. }
                | ValidationError::FieldNotAllowed { .. }
                | ValidationError::OperatorNotAllowed { .. }
                | ValidationError::PageSizeOutOfRange { .. }
                | ValidationError::TakeExceedsMax { .. }
                | ValidationError::HavingFieldNotAllowed(_)
                | ValidationError::UnknownJoinEntity(_)
        )
    }
}

/// Accumulated outcome of validating one query.
///
/// Serializes as `{"isValid": bool, "errors": [string]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Human-readable messages, in discovery order
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// True if any violation is a guardrail breach
    pub fn has_guardrail_violation(&self) -> bool {
        self.errors.iter().any(ValidationError::is_guardrail_violation)
    }

    /// Messages joined for logging and audit
    pub fn summary(&self) -> String {
        self.messages().join("; ")
    }
}

impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationResult", 2)?;
        state.serialize_field("isValid", &self.is_valid())?;
        state.serialize_field("errors", &self.messages())?;
        state.end()
    }
}

/// A query that passed validation.
///
/// Only `QueryValidator::accept` constructs one, and the translator accepts
/// nothing else, so an unvalidated query cannot reach storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery {
    query: AbstractQuery,
}

impl ValidatedQuery {
    pub(crate) fn new(query: AbstractQuery) -> Self {
        Self { query }
    }

    pub fn query(&self) -> &AbstractQuery {
        &self.query
    }

    pub fn entity(&self) -> &str {
        &self.query.entity
    }

    pub fn into_inner(self) -> AbstractQuery {
        self.query
    }
}
