//! Query validator
//!
//! Pure function of `(query, policy)`. Walks every part of the query and
//! collects violations; nothing here touches storage.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::policy::{EntityConfiguration, ValidationConfig};
use crate::query::{
    AbstractQuery, AggregateFunction, FilterCondition, FilterGroup, FilterLeaf, FilterOperator,
    JoinKind, LogicalOperator, OperationKind, QueryOperation, SortDirection,
};

use super::result::{FieldPurpose, ValidatedQuery, ValidationError, ValidationResult};

/// Which whitelist a filter tree is checked against
enum FilterScope<'a> {
    /// Root filters: the entity's filterable fields
    Entity(&'a EntityConfiguration),
    /// `Any`/`All` element predicates: `<collection>.<field>` entries
    Collection {
        entity: &'a EntityConfiguration,
        collection: &'a str,
    },
    /// `Having`: aggregation aliases, or filterable group fields
    Having {
        entity: &'a EntityConfiguration,
        group_fields: &'a [String],
        aliases: &'a BTreeSet<String>,
    },
}

impl FilterScope<'_> {
    fn check_field(&self, field: &str) -> Result<(), ValidationError> {
        match self {
            FilterScope::Entity(entity) => {
                if entity.is_filterable(field) {
                    Ok(())
                } else {
                    Err(not_allowed(field, entity, FieldPurpose::Filtering))
                }
            }
            FilterScope::Collection { entity, collection } => {
                let qualified = format!("{}.{}", collection, field);
                if entity.is_filterable(&qualified) {
                    Ok(())
                } else {
                    Err(not_allowed(&qualified, entity, FieldPurpose::Filtering))
                }
            }
            FilterScope::Having {
                entity,
                group_fields,
                aliases,
            } => {
                let grouped = group_fields.iter().any(|g| g == field) && entity.is_filterable(field);
                if aliases.contains(field) || grouped {
                    Ok(())
                } else {
                    Err(ValidationError::HavingFieldNotAllowed(field.to_string()))
                }
            }
        }
    }

    fn check_operator(&self, field: &str, op: FilterOperator) -> Result<(), ValidationError> {
        let (entity, key) = match self {
            FilterScope::Entity(entity) => (*entity, field.to_string()),
            FilterScope::Collection { entity, collection } => {
                (*entity, format!("{}.{}", collection, field))
            }
            FilterScope::Having {
                entity, aliases, ..
            } => {
                if aliases.contains(field) {
                    return Ok(());
                }
                (*entity, field.to_string())
            }
        };
        if entity.allows_operator(&key, op) {
            Ok(())
        } else {
            Err(ValidationError::OperatorNotAllowed {
                operator: op.as_str().to_string(),
                field: key,
                entity: entity.name.clone(),
            })
        }
    }
}

fn not_allowed(field: &str, entity: &EntityConfiguration, purpose: FieldPurpose) -> ValidationError {
    ValidationError::FieldNotAllowed {
        field: field.to_string(),
        entity: entity.name.clone(),
        purpose,
    }
}

/// Validates abstract queries against a `ValidationConfig`
#[derive(Debug, Clone)]
pub struct QueryValidator {
    config: Arc<ValidationConfig>,
}

impl QueryValidator {
    pub fn new(config: Arc<ValidationConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates a query, accumulating every violation
    pub fn validate(&self, query: &AbstractQuery) -> ValidationResult {
        let mut result = ValidationResult::new();

        let entity = if query.entity.trim().is_empty() {
            result.push(ValidationError::MissingEntity);
            None
        } else {
            let entity = self.config.entity(&query.entity);
            if entity.is_none() {
                result.push(ValidationError::UnknownEntity(query.entity.clone()));
            }
            entity
        };

        // Checks that do not depend on the entity run regardless
        self.check_page(query, &mut result);

        let Some(entity) = entity else {
            return result;
        };

        self.check_tree(&query.filters, &FilterScope::Entity(entity), &mut result);
        self.check_sort(query, entity, &mut result);
        for field in &query.select {
            if !entity.is_selectable(field) {
                result.push(not_allowed(field, entity, FieldPurpose::Selection));
            }
        }
        for operation in &query.operations {
            self.check_operation(operation, entity, &mut result);
        }
        self.check_grouping(query, entity, &mut result);
        self.check_joins(query, entity, &mut result);

        result
    }

    /// Validates and, on success, wraps the query for translation
    pub fn accept(&self, query: AbstractQuery) -> Result<ValidatedQuery, ValidationResult> {
        let result = self.validate(&query);
        if result.is_valid() {
            Ok(ValidatedQuery::new(query))
        } else {
            Err(result)
        }
    }

    fn check_page(&self, query: &AbstractQuery, result: &mut ValidationResult) {
        let Some(size) = query.page.as_ref().and_then(|p| p.size) else {
            return;
        };
        let max = self.config.max_page_size;
        if size < 1 || size > i64::from(max) {
            result.push(ValidationError::PageSizeOutOfRange { max, got: size });
        }
    }

    /// Checks limits over the whole tree first; when exceeded, one error
    /// stands for the entire tree and its leaves are not inspected.
    fn check_tree(
        &self,
        conditions: &[FilterCondition],
        scope: &FilterScope<'_>,
        result: &mut ValidationResult,
    ) {
        let depth = conditions.iter().map(FilterCondition::depth).max().unwrap_or(0);
        if depth > self.config.max_depth {
            result.push(ValidationError::FilterTooDeep {
                depth,
                max: self.config.max_depth,
            });
            return;
        }
        let count: usize = conditions.iter().map(FilterCondition::node_count).sum();
        if count > self.config.max_nodes {
            result.push(ValidationError::TooManyFilterNodes {
                count,
                max: self.config.max_nodes,
            });
            return;
        }

        for condition in conditions {
            self.check_condition(condition, scope, result);
        }
    }

    fn check_condition(
        &self,
        condition: &FilterCondition,
        scope: &FilterScope<'_>,
        result: &mut ValidationResult,
    ) {
        match condition {
            FilterCondition::Leaf(leaf) => self.check_leaf(leaf, scope, result),
            FilterCondition::Group(group) => self.check_group(group, scope, result),
        }
    }

    fn check_group(&self, group: &FilterGroup, scope: &FilterScope<'_>, result: &mut ValidationResult) {
        if LogicalOperator::parse(group.logic.as_deref()).is_none() {
            result.push(ValidationError::UnknownLogic(
                group.logic.clone().unwrap_or_default(),
            ));
        }
        if group.conditions.is_empty() {
            result.push(ValidationError::EmptyGroup);
        }
        for child in &group.conditions {
            self.check_condition(child, scope, result);
        }
    }

    fn check_leaf(&self, leaf: &FilterLeaf, scope: &FilterScope<'_>, result: &mut ValidationResult) {
        if leaf.field.trim().is_empty() {
            result.push(ValidationError::EmptyField { context: "Filter" });
            return;
        }
        if let Err(e) = scope.check_field(&leaf.field) {
            result.push(e);
        }

        let Some(op) = FilterOperator::parse(&leaf.operator) else {
            result.push(ValidationError::UnknownOperator {
                operator: leaf.operator.clone(),
                field: leaf.field.clone(),
            });
            return;
        };
        if let Err(e) = scope.check_operator(&leaf.field, op) {
            result.push(e);
        }

        if op.requires_value() && leaf.value.is_none() {
            result.push(ValidationError::ValueRequired {
                operator: op.as_str().to_string(),
                field: leaf.field.clone(),
            });
        }
        if op.forbids_value() && leaf.value.is_some() {
            result.push(ValidationError::ValueForbidden {
                operator: op.as_str().to_string(),
                field: leaf.field.clone(),
            });
        }
    }

    fn check_sort(&self, query: &AbstractQuery, entity: &EntityConfiguration, result: &mut ValidationResult) {
        let aliases = output_aliases(query);
        for spec in &query.sort {
            if spec.field.trim().is_empty() {
                result.push(ValidationError::EmptyField { context: "Sort" });
                continue;
            }
            // Grouped queries may also order by their aggregation aliases
            let is_alias = query.is_grouped() && aliases.contains(&spec.field);
            if !is_alias && !entity.is_sortable(&spec.field) {
                result.push(not_allowed(&spec.field, entity, FieldPurpose::Sorting));
            }
            if SortDirection::parse(&spec.direction).is_none() {
                result.push(ValidationError::InvalidSortDirection {
                    field: spec.field.clone(),
                    direction: spec.direction.clone(),
                });
            }
        }
    }

    fn check_operation(
        &self,
        operation: &QueryOperation,
        entity: &EntityConfiguration,
        result: &mut ValidationResult,
    ) {
        let Some(kind) = OperationKind::parse(&operation.kind) else {
            result.push(ValidationError::UnknownOperation(operation.kind.clone()));
            return;
        };
        let missing = |parameter: &'static str| ValidationError::MissingParameter {
            operation: kind.as_str().to_string(),
            parameter,
        };

        match kind {
            OperationKind::SelectMany => match operation.string_parameter("field") {
                Some(field) if !field.trim().is_empty() => {
                    if !entity.is_selectable(field) {
                        result.push(not_allowed(field, entity, FieldPurpose::Selection));
                    }
                }
                _ => result.push(missing("field")),
            },
            OperationKind::Skip | OperationKind::Take => match operation.parameter("count") {
                None => result.push(missing("count")),
                Some(value) => match value.as_u64() {
                    None => result.push(ValidationError::InvalidCount {
                        operation: kind.as_str().to_string(),
                        value: value.to_string(),
                    }),
                    Some(count) => {
                        let max = self.config.max_page_size;
                        if kind == OperationKind::Take && count > u64::from(max) {
                            result.push(ValidationError::TakeExceedsMax { count, max });
                        }
                    }
                },
            },
            OperationKind::Any | OperationKind::All => {
                let collection = operation
                    .string_parameter("collection")
                    .filter(|c| !c.trim().is_empty());
                let predicate = operation.parameter("predicate");
                if collection.is_none() {
                    result.push(missing("collection"));
                }
                if predicate.is_none() {
                    result.push(missing("predicate"));
                }
                if let (Some(collection), Some(predicate)) = (collection, predicate) {
                    if !entity.is_filterable(collection) {
                        result.push(not_allowed(collection, entity, FieldPurpose::Filtering));
                    }
                    self.check_element_predicate(kind, collection, predicate, entity, result);
                }
            }
            OperationKind::Distinct
            | OperationKind::Reverse
            | OperationKind::First
            | OperationKind::FirstOrDefault
            | OperationKind::Single
            | OperationKind::SingleOrDefault => {}
        }
    }

    fn check_element_predicate(
        &self,
        kind: OperationKind,
        collection: &str,
        predicate: &Value,
        entity: &EntityConfiguration,
        result: &mut ValidationResult,
    ) {
        let conditions = match parse_predicate(predicate) {
            Ok(conditions) => conditions,
            Err(reason) => {
                result.push(ValidationError::InvalidPredicate {
                    operation: kind.as_str().to_string(),
                    reason,
                });
                return;
            }
        };
        let scope = FilterScope::Collection { entity, collection };
        self.check_tree(&conditions, &scope, result);
    }

    fn check_grouping(&self, query: &AbstractQuery, entity: &EntityConfiguration, result: &mut ValidationResult) {
        let group_fields: &[String] = query
            .group_by
            .as_ref()
            .map(|g| g.fields.as_slice())
            .unwrap_or(&[]);
        let having = query
            .group_by
            .as_ref()
            .map(|g| g.having.as_slice())
            .unwrap_or(&[]);

        for field in group_fields {
            if !entity.is_selectable(field) {
                result.push(not_allowed(field, entity, FieldPurpose::Grouping));
            }
        }
        if group_fields.is_empty() {
            if !having.is_empty() {
                result.push(ValidationError::HavingWithoutGroupBy);
            }
            if !query.aggregations.is_empty() {
                result.push(ValidationError::AggregationWithoutGroupBy);
            }
        }

        let mut columns: BTreeSet<String> = group_fields.iter().cloned().collect();
        for aggregation in &query.aggregations {
            let Some(function) = AggregateFunction::parse(&aggregation.function) else {
                result.push(ValidationError::UnknownAggregate(aggregation.function.clone()));
                continue;
            };
            match aggregation.field.as_deref().filter(|f| !f.trim().is_empty()) {
                Some(field) => {
                    if !entity.is_selectable(field) {
                        result.push(not_allowed(field, entity, FieldPurpose::Aggregation));
                    }
                }
                None if function.requires_field() => {
                    result.push(ValidationError::AggregateFieldRequired(
                        function.as_str().to_string(),
                    ));
                }
                None => {}
            }
            let name = aggregation.output_name();
            if !columns.insert(name.clone()) {
                result.push(ValidationError::DuplicateAlias(name));
            }
        }

        if !group_fields.is_empty() && !having.is_empty() {
            let aliases = output_aliases(query);
            let scope = FilterScope::Having {
                entity,
                group_fields,
                aliases: &aliases,
            };
            self.check_tree(having, &scope, result);
        }
    }

    fn check_joins(&self, query: &AbstractQuery, entity: &EntityConfiguration, result: &mut ValidationResult) {
        for join in &query.joins {
            if JoinKind::parse(&join.kind).is_none() {
                result.push(ValidationError::UnknownJoinType(join.kind.clone()));
            }
            if join.entity.trim().is_empty() {
                result.push(ValidationError::JoinEntityRequired);
                continue;
            }
            if join.on.is_empty() {
                result.push(ValidationError::JoinOnRequired(join.entity.clone()));
            }

            let Some(joined) = self.config.entity(&join.entity) else {
                result.push(ValidationError::UnknownJoinEntity(join.entity.clone()));
                continue;
            };
            for (source, target) in &join.on {
                if !entity.is_filterable(source) {
                    result.push(not_allowed(source, entity, FieldPurpose::Filtering));
                }
                if !joined.is_filterable(target) {
                    result.push(not_allowed(target, joined, FieldPurpose::Filtering));
                }
            }
            for field in &join.select {
                if !joined.is_selectable(field) {
                    result.push(not_allowed(field, joined, FieldPurpose::Selection));
                }
            }
        }
    }
}

/// Output names of a query's aggregations
fn output_aliases(query: &AbstractQuery) -> BTreeSet<String> {
    query
        .aggregations
        .iter()
        .map(|a| a.output_name())
        .collect()
}

/// An `Any`/`All` predicate is a single condition or a list of them
pub(crate) fn parse_predicate(value: &Value) -> Result<Vec<FilterCondition>, String> {
    let conditions = match value {
        Value::Array(_) => serde_json::from_value::<Vec<FilterCondition>>(value.clone()),
        Value::Object(_) => serde_json::from_value::<FilterCondition>(value.clone()).map(|c| vec![c]),
        other => return Err(format!("expected an object or array, got {}", other)),
    }
    .map_err(|e| e.to_string())?;

    if conditions.is_empty() {
        return Err("predicate is empty".to_string());
    }
    Ok(conditions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{AggregationSpecification, GroupBySpecification, PageRequest, QueryBuilder};
    use serde_json::json;

    fn config() -> Arc<ValidationConfig> {
        Arc::new(
            ValidationConfig::default()
                .with_entity(
                    EntityConfiguration::new("User")
                        .filterable(["IsActive", "Name", "Age", "Orders", "Orders.Total"])
                        .sortable(["CreatedAt", "Name"])
                        .selectable(["Id", "Name", "Age", "Orders", "Country"])
                        .operators("Name", [FilterOperator::Eq, FilterOperator::Contains]),
                )
                .with_entity(
                    EntityConfiguration::new("Order")
                        .filterable(["UserId"])
                        .selectable(["Total"]),
                ),
        )
    }

    fn validator() -> QueryValidator {
        QueryValidator::new(config())
    }

    #[test]
    fn test_whitelisted_query_is_valid() {
        let query = QueryBuilder::for_entity("user")
            .equals("IsActive", true)
            .order_by_descending("CreatedAt")
            .select(["Id", "Name"])
            .page_size(10)
            .build()
            .unwrap();

        let result = validator().validate(&query);
        assert!(result.is_valid(), "{:?}", result.messages());
    }

    #[test]
    fn test_missing_and_unknown_entity() {
        let result = validator().validate(&AbstractQuery::new("  "));
        assert_eq!(result.errors(), &[ValidationError::MissingEntity]);

        let result = validator().validate(&AbstractQuery::new("Invoice"));
        assert_eq!(
            result.errors(),
            &[ValidationError::UnknownEntity("Invoice".into())]
        );
    }

    #[test]
    fn test_field_not_filterable() {
        let mut query = AbstractQuery::new("user");
        query.filters = vec![FilterCondition::leaf("PasswordHash", "eq", Some(json!("x")))];

        let result = validator().validate(&query);
        assert!(!result.is_valid());
        assert_eq!(
            result.messages(),
            vec!["Field 'PasswordHash' is not allowed for filtering on User".to_string()]
        );
    }

    #[test]
    fn test_field_match_is_case_sensitive() {
        let mut query = AbstractQuery::new("user");
        query.filters = vec![FilterCondition::leaf("isactive", "eq", Some(json!(true)))];
        assert!(!validator().validate(&query).is_valid());
    }

    #[test]
    fn test_operator_rules() {
        let mut query = AbstractQuery::new("user");
        query.filters = vec![
            FilterCondition::leaf("Name", "gt", Some(json!("a"))),
            FilterCondition::leaf("Age", "like", Some(json!(1))),
            FilterCondition::leaf("Name", "contains", None),
            FilterCondition::leaf("Age", "isnull", Some(json!(3))),
            FilterCondition::leaf("Age", "ISNOTNULL", None),
        ];

        let errors = validator().validate(&query).errors().to_vec();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], ValidationError::OperatorNotAllowed { .. }));
        assert!(matches!(errors[1], ValidationError::UnknownOperator { .. }));
        assert_eq!(
            errors[2].to_string(),
            "Operator 'contains' requires a value for field 'Name'"
        );
        assert!(matches!(errors[3], ValidationError::ValueForbidden { .. }));
    }

    #[test]
    fn test_depth_limit_records_single_error() {
        // Six nested levels of bad fields: only the depth error is reported
        let mut condition = FilterCondition::leaf("Nope", "eq", Some(json!(1)));
        for _ in 0..5 {
            condition = FilterCondition::all(vec![condition]);
        }
        assert_eq!(condition.depth(), 6);

        let mut query = AbstractQuery::new("user");
        query.filters = vec![condition];
        let result = validator().validate(&query);
        assert_eq!(
            result.errors(),
            &[ValidationError::FilterTooDeep { depth: 6, max: 5 }]
        );
    }

    #[test]
    fn test_depth_at_limit_is_accepted() {
        let mut condition = FilterCondition::leaf("Age", "gt", Some(json!(1)));
        for _ in 0..4 {
            condition = FilterCondition::all(vec![condition]);
        }
        let mut query = AbstractQuery::new("user");
        query.filters = vec![condition];
        assert!(validator().validate(&query).is_valid());
    }

    #[test]
    fn test_node_limit_counts_whole_tree() {
        let leaves: Vec<_> = (0..51)
            .map(|i| FilterCondition::leaf("Age", "eq", Some(json!(i))))
            .collect();
        let mut query = AbstractQuery::new("user");
        query.filters = leaves;

        let result = validator().validate(&query);
        assert_eq!(
            result.errors(),
            &[ValidationError::TooManyFilterNodes { count: 51, max: 50 }]
        );

        query.filters.pop();
        assert!(validator().validate(&query).is_valid());
    }

    #[test]
    fn test_group_shape_errors() {
        let mut query = AbstractQuery::new("user");
        query.filters = vec![FilterCondition::Group(FilterGroup {
            conditions: vec![],
            logic: Some("xor".into()),
        })];
        let errors = validator().validate(&query).errors().to_vec();
        assert!(errors.contains(&ValidationError::UnknownLogic("xor".into())));
        assert!(errors.contains(&ValidationError::EmptyGroup));
    }

    #[test]
    fn test_page_size_bounds() {
        for (size, valid) in [(0, false), (1, true), (200, true), (201, false), (500, false)] {
            let mut query = AbstractQuery::new("user");
            query.page = Some(PageRequest {
                size: Some(size),
                cursor: None,
            });
            let result = validator().validate(&query);
            assert_eq!(result.is_valid(), valid, "size {}", size);
        }

        let mut query = AbstractQuery::new("user");
        query.page = Some(PageRequest {
            size: Some(500),
            cursor: None,
        });
        assert_eq!(
            validator().validate(&query).messages(),
            vec!["Page size must be between 1 and 200, got 500".to_string()]
        );
    }

    #[test]
    fn test_sort_rules() {
        let mut query = AbstractQuery::new("user");
        query.sort = vec![
            crate::query::SortSpecification::asc("Age"),
            crate::query::SortSpecification {
                field: "Name".into(),
                direction: "sideways".into(),
            },
            crate::query::SortSpecification {
                field: "CreatedAt".into(),
                direction: "DESC".into(),
            },
        ];
        let errors = validator().validate(&query).errors().to_vec();
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            &errors[0],
            ValidationError::FieldNotAllowed { purpose: FieldPurpose::Sorting, .. }
        ));
        assert!(matches!(errors[1], ValidationError::InvalidSortDirection { .. }));
    }

    #[test]
    fn test_operation_rules() {
        let mut query = AbstractQuery::new("user");
        query.operations = vec![
            QueryOperation::new("Teleport"),
            QueryOperation::new("skip").with_parameter("count", json!(-1)),
            QueryOperation::new("Take").with_parameter("count", json!(500)),
            QueryOperation::new("Take"),
            QueryOperation::new("SelectMany").with_parameter("field", json!("Secrets")),
            QueryOperation::new("Any").with_parameter("collection", json!("Orders")),
            QueryOperation::new("reverse"),
        ];

        let errors = validator().validate(&query).errors().to_vec();
        assert_eq!(
            errors,
            vec![
                ValidationError::UnknownOperation("Teleport".into()),
                ValidationError::InvalidCount {
                    operation: "Skip".into(),
                    value: "-1".into()
                },
                ValidationError::TakeExceedsMax { count: 500, max: 200 },
                ValidationError::MissingParameter {
                    operation: "Take".into(),
                    parameter: "count"
                },
                ValidationError::FieldNotAllowed {
                    field: "Secrets".into(),
                    entity: "User".into(),
                    purpose: FieldPurpose::Selection
                },
                ValidationError::MissingParameter {
                    operation: "Any".into(),
                    parameter: "predicate"
                },
            ]
        );
    }

    #[test]
    fn test_any_predicate_uses_collection_whitelist() {
        let query = QueryBuilder::for_entity("user")
            .any("Orders", |c| c.greater_than("Total", 100))
            .build()
            .unwrap();
        assert!(validator().validate(&query).is_valid());

        let query = QueryBuilder::for_entity("user")
            .all("Orders", |c| c.equals("Status", "paid"))
            .build()
            .unwrap();
        let messages = validator().validate(&query).messages();
        assert_eq!(
            messages,
            vec!["Field 'Orders.Status' is not allowed for filtering on User".to_string()]
        );
    }

    #[test]
    fn test_grouping_rules() {
        let mut query = AbstractQuery::new("user");
        query.group_by = Some(GroupBySpecification {
            fields: vec!["Country".into()],
            having: vec![
                FilterCondition::leaf("count", "gt", Some(json!(1))),
                FilterCondition::leaf("Country", "eq", Some(json!("NL"))),
            ],
        });
        query.aggregations = vec![
            AggregationSpecification {
                function: "count".into(),
                field: None,
                alias: None,
            },
            AggregationSpecification {
                function: "median".into(),
                field: Some("Age".into()),
                alias: None,
            },
            AggregationSpecification {
                function: "sum".into(),
                field: None,
                alias: None,
            },
        ];

        let errors = validator().validate(&query).errors().to_vec();
        assert_eq!(
            errors,
            vec![
                ValidationError::UnknownAggregate("median".into()),
                ValidationError::AggregateFieldRequired("sum".into()),
                // Country is groupable but not filterable
                ValidationError::HavingFieldNotAllowed("Country".into()),
            ]
        );
    }

    #[test]
    fn test_aggregations_need_group_by() {
        let mut query = AbstractQuery::new("user");
        query.aggregations = vec![AggregationSpecification {
            function: "count".into(),
            field: None,
            alias: None,
        }];
        assert_eq!(
            validator().validate(&query).errors(),
            &[ValidationError::AggregationWithoutGroupBy]
        );
    }

    #[test]
    fn test_join_rules() {
        let query = QueryBuilder::for_entity("user")
            .join("Order", &[("Id", "UserId")], ["Total"])
            .build()
            .unwrap();
        let errors = validator().validate(&query).errors().to_vec();
        // Id is selectable on User but not filterable
        assert_eq!(
            errors,
            vec![ValidationError::FieldNotAllowed {
                field: "Id".into(),
                entity: "User".into(),
                purpose: FieldPurpose::Filtering
            }]
        );

        let mut query = AbstractQuery::new("user");
        query.joins = vec![crate::query::JoinSpecification {
            kind: "cross".into(),
            entity: "Invoice".into(),
            on: Default::default(),
            select: vec![],
        }];
        let errors = validator().validate(&query).errors().to_vec();
        assert_eq!(
            errors,
            vec![
                ValidationError::UnknownJoinType("cross".into()),
                ValidationError::JoinOnRequired("Invoice".into()),
                ValidationError::UnknownJoinEntity("Invoice".into()),
            ]
        );
    }

    #[test]
    fn test_accept_gates_translation() {
        let ok = validator().accept(AbstractQuery::new("User"));
        assert_eq!(ok.unwrap().entity(), "User");

        let rejected = validator().accept(AbstractQuery::new("Ghost"));
        assert!(!rejected.unwrap_err().is_valid());
    }
}
