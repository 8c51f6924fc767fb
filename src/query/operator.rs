//! Operator vocabularies of the query model
//!
//! The wire model carries operators, directions, logic and operation types as
//! free-form strings so that the validator can report every unknown symbol.
//! These enums are the closed sets those strings are parsed into. Parsing is
//! case-insensitive; `as_str` returns the canonical wire symbol.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Filter comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// field == value
    Eq,
    /// field != value
    Ne,
    /// field < value
    Lt,
    /// field <= value
    Lte,
    /// field > value
    Gt,
    /// field >= value
    Gte,
    /// Substring match (string fields only)
    Contains,
    /// Prefix match (string fields only)
    StartsWith,
    /// Suffix match (string fields only)
    EndsWith,
    /// Membership in the supplied array
    In,
    /// field is null
    IsNull,
    /// field is not null
    IsNotNull,
    /// Case-insensitive string equality
    EqualsIgnoreCase,
}

impl FilterOperator {
    /// Every supported operator, in canonical order
    pub const ALL: [FilterOperator; 13] = [
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Contains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::In,
        FilterOperator::IsNull,
        FilterOperator::IsNotNull,
        FilterOperator::EqualsIgnoreCase,
    ];

    /// Parses a wire symbol (case-insensitive)
    pub fn parse(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|op| op.as_str() == symbol)
    }

    /// Returns the canonical wire symbol
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "startswith",
            FilterOperator::EndsWith => "endswith",
            FilterOperator::In => "in",
            FilterOperator::IsNull => "isnull",
            FilterOperator::IsNotNull => "isnotnull",
            FilterOperator::EqualsIgnoreCase => "equalsignorecase",
        }
    }

    /// Operators that must carry a non-null value
    pub fn requires_value(&self) -> bool {
        !self.forbids_value()
    }

    /// Operators that must not carry a value
    pub fn forbids_value(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }

    /// Operators that only apply to string-typed fields
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            FilterOperator::Contains
                | FilterOperator::StartsWith
                | FilterOperator::EndsWith
                | FilterOperator::EqualsIgnoreCase
        )
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the children of a filter group combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    /// Parses a group's logic; a missing value means AND
    pub fn parse(symbol: Option<&str>) -> Option<Self> {
        match symbol.map(|s| s.trim().to_ascii_lowercase()) {
            None => Some(LogicalOperator::And),
            Some(s) if s.is_empty() || s == "and" => Some(LogicalOperator::And),
            Some(s) if s == "or" => Some(LogicalOperator::Or),
            Some(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "and",
            LogicalOperator::Or => "or",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sequence operations a query may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    SelectMany,
    Distinct,
    Skip,
    Take,
    Any,
    All,
    Reverse,
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
}

impl OperationKind {
    pub const ALL: [OperationKind; 11] = [
        OperationKind::SelectMany,
        OperationKind::Distinct,
        OperationKind::Skip,
        OperationKind::Take,
        OperationKind::Any,
        OperationKind::All,
        OperationKind::Reverse,
        OperationKind::First,
        OperationKind::FirstOrDefault,
        OperationKind::Single,
        OperationKind::SingleOrDefault,
    ];

    /// Parses an operation type (case-insensitive, `SelectMany` == `selectmany`)
    pub fn parse(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(symbol))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::SelectMany => "SelectMany",
            OperationKind::Distinct => "Distinct",
            OperationKind::Skip => "Skip",
            OperationKind::Take => "Take",
            OperationKind::Any => "Any",
            OperationKind::All => "All",
            OperationKind::Reverse => "Reverse",
            OperationKind::First => "First",
            OperationKind::FirstOrDefault => "FirstOrDefault",
            OperationKind::Single => "Single",
            OperationKind::SingleOrDefault => "SingleOrDefault",
        }
    }

    /// Runs before projection, over internal records
    pub fn is_pre_projection(&self) -> bool {
        matches!(
            self,
            OperationKind::SelectMany
                | OperationKind::Distinct
                | OperationKind::Skip
                | OperationKind::Take
                | OperationKind::Any
                | OperationKind::All
                | OperationKind::Reverse
        )
    }

    /// Also flips every ordering key, so the sorted page and its cursor
    /// follow the reversed order
    pub fn flips_order(&self) -> bool {
        matches!(self, OperationKind::Reverse)
    }

    /// Runs after projection and sort, over projected records.
    /// `Distinct` appears in both phases.
    pub fn is_post_projection(&self) -> bool {
        matches!(
            self,
            OperationKind::Distinct
                | OperationKind::First
                | OperationKind::FirstOrDefault
                | OperationKind::Single
                | OperationKind::SingleOrDefault
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim().to_ascii_lowercase().as_str() {
            "count" => Some(AggregateFunction::Count),
            "sum" => Some(AggregateFunction::Sum),
            "avg" => Some(AggregateFunction::Avg),
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }

    pub fn requires_field(&self) -> bool {
        !matches!(self, AggregateFunction::Count)
    }
}

/// Join flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Inner join, one output row per match
    Join,
    /// One output row per source row, matches nested as an array
    GroupJoin,
}

impl JoinKind {
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim().to_ascii_lowercase().as_str() {
            "join" => Some(JoinKind::Join),
            "groupjoin" => Some(JoinKind::GroupJoin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Join => "join",
            JoinKind::GroupJoin => "groupjoin",
        }
    }
}
