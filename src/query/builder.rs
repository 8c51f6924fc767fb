//! Fluent query builder
//!
//! Client-side assembly of a well-formed [`AbstractQuery`]. Each call appends
//! one node and returns the builder. The builder performs no I/O and only
//! checks that field names are non-empty and operators are recognized; the
//! first such mistake is remembered and reported by [`QueryBuilder::build`].

use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error;

use super::model::{
    AbstractQuery, AggregationSpecification, FilterCondition, GroupBySpecification,
    JoinSpecification, PageRequest, QueryHints, QueryOperation, SortSpecification,
};
use super::operator::{AggregateFunction, FilterOperator, JoinKind, OperationKind};

/// Page size ceiling applied client-side when none is configured
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 200;

/// Builder errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    #[error("Query entity was never set")]
    MissingEntity,

    #[error("Field name must not be empty ({0})")]
    EmptyField(&'static str),

    #[error("Unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("Predicate could not be encoded: {0}")]
    InvalidPredicate(String),
}

impl BuilderError {
    pub fn code(&self) -> &'static str {
        match self {
            BuilderError::MissingEntity => "AERO_QUERY_BUILDER_MISSING_ENTITY",
            BuilderError::EmptyField(_) => "AERO_QUERY_BUILDER_EMPTY_FIELD",
            BuilderError::UnknownOperator(_) => "AERO_QUERY_BUILDER_UNKNOWN_OPERATOR",
            BuilderError::InvalidPredicate(_) => "AERO_QUERY_BUILDER_INVALID_PREDICATE",
        }
    }
}

pub type BuilderResult<T> = Result<T, BuilderError>;

/// Accumulates filter conditions; shared by the query body, groups,
/// `Having` and `Any`/`All` predicates.
#[derive(Debug, Clone, Default)]
pub struct ConditionBuilder {
    conditions: Vec<FilterCondition>,
    error: Option<BuilderError>,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, error: BuilderError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn push_leaf(mut self, field: &str, op: FilterOperator, value: Option<Value>) -> Self {
        if field.trim().is_empty() {
            self.fail(BuilderError::EmptyField("filter"));
            return self;
        }
        self.conditions
            .push(FilterCondition::leaf(field, op.as_str(), value));
        self
    }

    /// Adds a leaf with an operator given by symbol
    pub fn filter(mut self, field: &str, operator: &str, value: Option<Value>) -> Self {
        match FilterOperator::parse(operator) {
            Some(op) => self.push_leaf(field, op, value),
            None => {
                self.fail(BuilderError::UnknownOperator(operator.to_string()));
                self
            }
        }
    }

    pub fn equals(self, field: &str, value: impl Into<Value>) -> Self {
        self.push_leaf(field, FilterOperator::Eq, Some(value.into()))
    }

    pub fn not_equals(self, field: &str, value: impl Into<Value>) -> Self {
        self.push_leaf(field, FilterOperator::Ne, Some(value.into()))
    }

    pub fn less_than(self, field: &str, value: impl Into<Value>) -> Self {
        self.push_leaf(field, FilterOperator::Lt, Some(value.into()))
    }

    pub fn less_than_or_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.push_leaf(field, FilterOperator::Lte, Some(value.into()))
    }

    pub fn greater_than(self, field: &str, value: impl Into<Value>) -> Self {
        self.push_leaf(field, FilterOperator::Gt, Some(value.into()))
    }

    pub fn greater_than_or_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.push_leaf(field, FilterOperator::Gte, Some(value.into()))
    }

    pub fn contains(self, field: &str, value: impl Into<String>) -> Self {
        self.push_leaf(field, FilterOperator::Contains, Some(Value::String(value.into())))
    }

    pub fn starts_with(self, field: &str, value: impl Into<String>) -> Self {
        self.push_leaf(field, FilterOperator::StartsWith, Some(Value::String(value.into())))
    }

    pub fn ends_with(self, field: &str, value: impl Into<String>) -> Self {
        self.push_leaf(field, FilterOperator::EndsWith, Some(Value::String(value.into())))
    }

    pub fn equals_ignore_case(self, field: &str, value: impl Into<String>) -> Self {
        self.push_leaf(
            field,
            FilterOperator::EqualsIgnoreCase,
            Some(Value::String(value.into())),
        )
    }

    pub fn is_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.push_leaf(field, FilterOperator::In, Some(Value::Array(values)))
    }

    pub fn is_null(self, field: &str) -> Self {
        self.push_leaf(field, FilterOperator::IsNull, None)
    }

    pub fn is_not_null(self, field: &str) -> Self {
        self.push_leaf(field, FilterOperator::IsNotNull, None)
    }

    /// Adds a nested AND group
    pub fn and_group(self, f: impl FnOnce(ConditionBuilder) -> ConditionBuilder) -> Self {
        self.group(f, FilterCondition::all)
    }

    /// Adds a nested OR group
    pub fn or_group(self, f: impl FnOnce(ConditionBuilder) -> ConditionBuilder) -> Self {
        self.group(f, FilterCondition::any)
    }

    fn group(
        mut self,
        f: impl FnOnce(ConditionBuilder) -> ConditionBuilder,
        wrap: fn(Vec<FilterCondition>) -> FilterCondition,
    ) -> Self {
        let inner = f(ConditionBuilder::new());
        if let Some(error) = inner.error {
            self.fail(error);
        }
        self.conditions.push(wrap(inner.conditions));
        self
    }

    /// Finishes into a list of conditions
    pub fn into_conditions(self) -> BuilderResult<Vec<FilterCondition>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.conditions),
        }
    }

    /// Finishes into a single AND-combined predicate
    pub fn into_predicate(self) -> BuilderResult<FilterCondition> {
        let mut conditions = self.into_conditions()?;
        if conditions.len() == 1 {
            if let Some(only) = conditions.pop() {
                return Ok(only);
            }
        }
        Ok(FilterCondition::all(conditions))
    }
}

/// Fluent constructor for [`AbstractQuery`]
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: AbstractQuery,
    filters: ConditionBuilder,
    having: ConditionBuilder,
    max_page_size: u32,
    error: Option<BuilderError>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            query: AbstractQuery::default(),
            filters: ConditionBuilder::new(),
            having: ConditionBuilder::new(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            error: None,
        }
    }

    /// Shorthand for `QueryBuilder::new().entity(name)`
    pub fn for_entity(entity: impl Into<String>) -> Self {
        Self::new().entity(entity)
    }

    /// Overrides the ceiling used to clamp `page_size`
    pub fn with_max_page_size(mut self, max: u32) -> Self {
        self.max_page_size = max.max(1);
        self
    }

    fn fail(&mut self, error: BuilderError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn check_field(&mut self, field: &str, context: &'static str) -> bool {
        if field.trim().is_empty() {
            self.fail(BuilderError::EmptyField(context));
            return false;
        }
        true
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.query.entity = entity.into();
        self
    }

    // Filters

    /// Adds conditions through a [`ConditionBuilder`]
    pub fn filters(mut self, f: impl FnOnce(ConditionBuilder) -> ConditionBuilder) -> Self {
        self.filters = f(self.filters);
        self
    }

    pub fn filter(mut self, field: &str, operator: &str, value: Option<Value>) -> Self {
        self.filters = self.filters.filter(field, operator, value);
        self
    }

    pub fn equals(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters = self.filters.equals(field, value);
        self
    }

    pub fn not_equals(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters = self.filters.not_equals(field, value);
        self
    }

    pub fn less_than(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters = self.filters.less_than(field, value);
        self
    }

    pub fn less_than_or_equal(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters = self.filters.less_than_or_equal(field, value);
        self
    }

    pub fn greater_than(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters = self.filters.greater_than(field, value);
        self
    }

    pub fn greater_than_or_equal(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters = self.filters.greater_than_or_equal(field, value);
        self
    }

    pub fn contains(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters = self.filters.contains(field, value);
        self
    }

    pub fn starts_with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters = self.filters.starts_with(field, value);
        self
    }

    pub fn ends_with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters = self.filters.ends_with(field, value);
        self
    }

    pub fn equals_ignore_case(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters = self.filters.equals_ignore_case(field, value);
        self
    }

    pub fn is_in<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filters = self.filters.is_in(field, values);
        self
    }

    pub fn is_null(mut self, field: &str) -> Self {
        self.filters = self.filters.is_null(field);
        self
    }

    pub fn is_not_null(mut self, field: &str) -> Self {
        self.filters = self.filters.is_not_null(field);
        self
    }

    pub fn and_group(mut self, f: impl FnOnce(ConditionBuilder) -> ConditionBuilder) -> Self {
        self.filters = self.filters.and_group(f);
        self
    }

    pub fn or_group(mut self, f: impl FnOnce(ConditionBuilder) -> ConditionBuilder) -> Self {
        self.filters = self.filters.or_group(f);
        self
    }

    // Sort

    pub fn order_by(mut self, field: &str) -> Self {
        if self.check_field(field, "sort") {
            self.query.sort.push(SortSpecification::asc(field));
        }
        self
    }

    pub fn order_by_descending(mut self, field: &str) -> Self {
        if self.check_field(field, "sort") {
            self.query.sort.push(SortSpecification::desc(field));
        }
        self
    }

    /// Secondary key; identical to `order_by` since list order is precedence
    pub fn then_by(self, field: &str) -> Self {
        self.order_by(field)
    }

    pub fn then_by_descending(self, field: &str) -> Self {
        self.order_by_descending(field)
    }

    // Projection and paging

    pub fn select<S: AsRef<str>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        for field in fields {
            let field = field.as_ref();
            if self.check_field(field, "select") {
                self.query.select.push(field.to_string());
            }
        }
        self
    }

    /// Sets the page size, clamped to `[1, max_page_size]`
    pub fn page_size(mut self, size: u32) -> Self {
        let size = size.clamp(1, self.max_page_size);
        self.query.page.get_or_insert_with(PageRequest::default).size = Some(i64::from(size));
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.query.page.get_or_insert_with(PageRequest::default).cursor = Some(cursor.into());
        self
    }

    pub fn include_count(mut self) -> Self {
        self.query
            .hints
            .get_or_insert_with(QueryHints::default)
            .include_count = true;
        self
    }

    pub fn cache_ttl_seconds(mut self, ttl: u64) -> Self {
        self.query
            .hints
            .get_or_insert_with(QueryHints::default)
            .cache_ttl_seconds = Some(ttl);
        self
    }

    // Operations

    fn operation(mut self, operation: QueryOperation) -> Self {
        self.query.operations.push(operation);
        self
    }

    pub fn select_many(mut self, field: &str) -> Self {
        if !self.check_field(field, "selectMany") {
            return self;
        }
        self.operation(
            QueryOperation::new(OperationKind::SelectMany.as_str())
                .with_parameter("field", json!(field)),
        )
    }

    pub fn distinct(self) -> Self {
        self.operation(QueryOperation::new(OperationKind::Distinct.as_str()))
    }

    pub fn skip(self, count: u64) -> Self {
        self.operation(
            QueryOperation::new(OperationKind::Skip.as_str()).with_parameter("count", json!(count)),
        )
    }

    pub fn take(self, count: u64) -> Self {
        self.operation(
            QueryOperation::new(OperationKind::Take.as_str()).with_parameter("count", json!(count)),
        )
    }

    /// Keeps records where some element of `collection` matches the predicate
    pub fn any(
        self,
        collection: &str,
        f: impl FnOnce(ConditionBuilder) -> ConditionBuilder,
    ) -> Self {
        self.quantified(OperationKind::Any, collection, f)
    }

    /// Keeps records where every element of `collection` matches the predicate
    pub fn all(
        self,
        collection: &str,
        f: impl FnOnce(ConditionBuilder) -> ConditionBuilder,
    ) -> Self {
        self.quantified(OperationKind::All, collection, f)
    }

    fn quantified(
        mut self,
        kind: OperationKind,
        collection: &str,
        f: impl FnOnce(ConditionBuilder) -> ConditionBuilder,
    ) -> Self {
        if !self.check_field(collection, "collection") {
            return self;
        }
        let predicate = match f(ConditionBuilder::new()).into_predicate() {
            Ok(predicate) => predicate,
            Err(error) => {
                self.fail(error);
                return self;
            }
        };
        let predicate = match serde_json::to_value(predicate) {
            Ok(value) => value,
            Err(error) => {
                self.fail(BuilderError::InvalidPredicate(error.to_string()));
                return self;
            }
        };
        self.operation(
            QueryOperation::new(kind.as_str())
                .with_parameter("collection", json!(collection))
                .with_parameter("predicate", predicate),
        )
    }

    pub fn reverse(self) -> Self {
        self.operation(QueryOperation::new(OperationKind::Reverse.as_str()))
    }

    pub fn first(self) -> Self {
        self.operation(QueryOperation::new(OperationKind::First.as_str()))
    }

    pub fn first_or_default(self) -> Self {
        self.operation(QueryOperation::new(OperationKind::FirstOrDefault.as_str()))
    }

    pub fn single(self) -> Self {
        self.operation(QueryOperation::new(OperationKind::Single.as_str()))
    }

    pub fn single_or_default(self) -> Self {
        self.operation(QueryOperation::new(OperationKind::SingleOrDefault.as_str()))
    }

    // Grouping and aggregation

    pub fn group_by<S: AsRef<str>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        let mut names = Vec::new();
        for field in fields {
            let field = field.as_ref();
            if self.check_field(field, "groupBy") {
                names.push(field.to_string());
            }
        }
        self.query
            .group_by
            .get_or_insert_with(GroupBySpecification::default)
            .fields
            .extend(names);
        self
    }

    pub fn having(mut self, f: impl FnOnce(ConditionBuilder) -> ConditionBuilder) -> Self {
        self.having = f(self.having);
        self
    }

    fn aggregate(
        mut self,
        function: AggregateFunction,
        field: Option<&str>,
        alias: Option<&str>,
    ) -> Self {
        if let Some(field) = field {
            if !self.check_field(field, "aggregation") {
                return self;
            }
        }
        self.query.aggregations.push(AggregationSpecification {
            function: function.as_str().to_string(),
            field: field.map(str::to_string),
            alias: alias.map(str::to_string),
        });
        self
    }

    pub fn count(self, alias: Option<&str>) -> Self {
        self.aggregate(AggregateFunction::Count, None, alias)
    }

    pub fn sum(self, field: &str, alias: Option<&str>) -> Self {
        self.aggregate(AggregateFunction::Sum, Some(field), alias)
    }

    pub fn average(self, field: &str, alias: Option<&str>) -> Self {
        self.aggregate(AggregateFunction::Avg, Some(field), alias)
    }

    pub fn min(self, field: &str, alias: Option<&str>) -> Self {
        self.aggregate(AggregateFunction::Min, Some(field), alias)
    }

    pub fn max(self, field: &str, alias: Option<&str>) -> Self {
        self.aggregate(AggregateFunction::Max, Some(field), alias)
    }

    // Joins

    fn push_join<S: AsRef<str>>(
        mut self,
        kind: JoinKind,
        entity: &str,
        on: &[(&str, &str)],
        select: impl IntoIterator<Item = S>,
    ) -> Self {
        if !self.check_field(entity, "join entity") {
            return self;
        }
        let mut pairs = BTreeMap::new();
        for (source, target) in on {
            if self.check_field(source, "join source") && self.check_field(target, "join target") {
                pairs.insert(source.to_string(), target.to_string());
            }
        }
        let select = select
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        self.query.joins.push(JoinSpecification {
            kind: kind.as_str().to_string(),
            entity: entity.to_string(),
            on: pairs,
            select,
        });
        self
    }

    pub fn join<S: AsRef<str>>(
        self,
        entity: &str,
        on: &[(&str, &str)],
        select: impl IntoIterator<Item = S>,
    ) -> Self {
        self.push_join(JoinKind::Join, entity, on, select)
    }

    pub fn group_join<S: AsRef<str>>(
        self,
        entity: &str,
        on: &[(&str, &str)],
        select: impl IntoIterator<Item = S>,
    ) -> Self {
        self.push_join(JoinKind::GroupJoin, entity, on, select)
    }

    /// Finishes the query
    pub fn build(self) -> BuilderResult<AbstractQuery> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.query.entity.trim().is_empty() {
            return Err(BuilderError::MissingEntity);
        }

        let mut query = self.query;
        query.filters = self.filters.into_conditions()?;
        let having = self.having.into_conditions()?;
        if !having.is_empty() {
            query
                .group_by
                .get_or_insert_with(GroupBySpecification::default)
                .having = having;
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::model::FilterGroup;

    #[test]
    fn test_build_requires_entity() {
        let result = QueryBuilder::new().equals("Name", "x").build();
        assert_eq!(result.unwrap_err(), BuilderError::MissingEntity);
    }

    #[test]
    fn test_build_simple_query() {
        let query = QueryBuilder::for_entity("user")
            .equals("IsActive", true)
            .order_by_descending("CreatedAt")
            .then_by("Id")
            .select(["Id", "Name"])
            .page_size(10)
            .build()
            .unwrap();

        assert_eq!(query.entity, "user");
        assert_eq!(
            query.filters,
            vec![FilterCondition::leaf("IsActive", "eq", Some(json!(true)))]
        );
        assert_eq!(query.sort.len(), 2);
        assert_eq!(query.sort[0].direction, "desc");
        assert_eq!(query.sort[1].direction, "asc");
        assert_eq!(query.page.unwrap().size, Some(10));
    }

    #[test]
    fn test_page_size_clamped() {
        let query = QueryBuilder::for_entity("user").page_size(5000).build().unwrap();
        assert_eq!(query.page.unwrap().size, Some(200));

        let query = QueryBuilder::for_entity("user")
            .with_max_page_size(50)
            .page_size(0)
            .build()
            .unwrap();
        assert_eq!(query.page.unwrap().size, Some(1));
    }

    #[test]
    fn test_empty_field_rejected() {
        let result = QueryBuilder::for_entity("user").contains("", "x").build();
        assert_eq!(result.unwrap_err(), BuilderError::EmptyField("filter"));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let result = QueryBuilder::for_entity("user")
            .filter("Name", "like", Some(json!("x")))
            .build();
        assert_eq!(
            result.unwrap_err(),
            BuilderError::UnknownOperator("like".into())
        );
    }

    #[test]
    fn test_nested_groups() {
        let query = QueryBuilder::for_entity("user")
            .or_group(|g| g.equals("Role", "admin").and_group(|g| g.is_null("DeletedAt")))
            .build()
            .unwrap();

        match &query.filters[0] {
            FilterCondition::Group(FilterGroup { conditions, logic }) => {
                assert_eq!(logic.as_deref(), Some("or"));
                assert_eq!(conditions.len(), 2);
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_operations_and_aggregations() {
        let query = QueryBuilder::for_entity("order")
            .skip(5)
            .take(10)
            .any("Lines", |p| p.greater_than("Quantity", 3))
            .group_by(["CustomerId"])
            .count(None)
            .sum("Total", Some("revenue"))
            .having(|h| h.greater_than("revenue", 100))
            .build()
            .unwrap();

        assert_eq!(query.operations.len(), 3);
        assert_eq!(query.operations[0].parameter("count"), Some(&json!(5)));
        assert_eq!(query.operations[2].string_parameter("collection"), Some("Lines"));
        assert!(query.operations[2].parameter("predicate").is_some());
        assert_eq!(query.aggregations.len(), 2);
        let group_by = query.group_by.unwrap();
        assert_eq!(group_by.fields, vec!["CustomerId".to_string()]);
        assert_eq!(group_by.having.len(), 1);
    }

    #[test]
    fn test_joins() {
        let query = QueryBuilder::for_entity("order")
            .join("customer", &[("CustomerId", "Id")], ["Name"])
            .build()
            .unwrap();

        assert_eq!(query.joins[0].kind, "join");
        assert_eq!(query.joins[0].on.get("CustomerId").map(String::as_str), Some("Id"));
    }
}
