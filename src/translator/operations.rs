//! Sequence operations
//!
//! Pre-projection operations run over internal records in request order.
//! Post-projection operations run over projected, sorted rows. `Reverse`
//! flips enumeration order for the operations after it and, through
//! [`reverses_order`], the final sort.

use std::collections::HashSet;

use serde_json::Value;

use crate::query::{OperationKind, QueryOperation};
use crate::schema::{EntitySchema, FieldType, Record};
use crate::validation::parse_predicate;

use super::errors::{QueryError, QueryResult};
use super::filters::PredicateFilter;
use super::predicate::PredicateCompiler;

/// Applies every pre-projection operation in list order
pub fn apply_pre_projection(
    mut rows: Vec<Record>,
    operations: &[QueryOperation],
    schema: &EntitySchema,
    max_take: u32,
) -> QueryResult<Vec<Record>> {
    for operation in operations {
        let kind = parse_kind(operation)?;
        if !kind.is_pre_projection() {
            continue;
        }
        rows = match kind {
            OperationKind::SelectMany => select_many(rows, operation, schema)?,
            OperationKind::Distinct => distinct(rows),
            OperationKind::Skip => {
                let count = count_parameter(operation)?;
                rows.into_iter().skip(count).collect()
            }
            OperationKind::Take => {
                let count = count_parameter(operation)?.min(max_take as usize);
                rows.truncate(count);
                rows
            }
            OperationKind::Any | OperationKind::All => quantified(rows, kind, operation, schema)?,
            OperationKind::Reverse => {
                rows.reverse();
                rows
            }
            _ => rows,
        };
    }
    Ok(rows)
}

/// True when the requested order is reversed (an odd number of `Reverse`)
pub fn reverses_order(operations: &[QueryOperation]) -> QueryResult<bool> {
    let mut reversed = false;
    for operation in operations {
        if parse_kind(operation)?.flips_order() {
            reversed = !reversed;
        }
    }
    Ok(reversed)
}

/// Applies every post-projection operation in list order
pub fn apply_post_projection(
    rows: Vec<Record>,
    operations: &[QueryOperation],
) -> QueryResult<Vec<Record>> {
    apply_post_projection_by(rows, operations, |row| row)
}

/// Post-projection operations over rows whose projected shape is
/// `projected(row)`; `Distinct` compares that shape only
pub fn apply_post_projection_by<R>(
    mut rows: Vec<R>,
    operations: &[QueryOperation],
    projected: impl Fn(&R) -> &Record,
) -> QueryResult<Vec<R>> {
    for operation in operations {
        let kind = parse_kind(operation)?;
        if !kind.is_post_projection() {
            continue;
        }
        rows = match kind {
            OperationKind::Distinct => distinct_by(rows, &projected),
            OperationKind::First | OperationKind::FirstOrDefault => {
                rows.truncate(1);
                rows
            }
            // Two rows let the caller detect "more than one"
            OperationKind::Single | OperationKind::SingleOrDefault => {
                rows.truncate(2);
                rows
            }
            _ => rows,
        };
    }
    Ok(rows)
}

fn parse_kind(operation: &QueryOperation) -> QueryResult<OperationKind> {
    OperationKind::parse(&operation.kind)
        .ok_or_else(|| QueryError::UnsupportedOperator(operation.kind.clone()))
}

fn count_parameter(operation: &QueryOperation) -> QueryResult<usize> {
    operation
        .parameter("count")
        .and_then(Value::as_u64)
        .map(|c| usize::try_from(c).unwrap_or(usize::MAX))
        .ok_or_else(|| {
            QueryError::InvalidOperation(format!(
                "{} requires a non-negative integer count",
                operation.kind
            ))
        })
}

/// Whole-record dedup, first occurrence wins
fn distinct(rows: Vec<Record>) -> Vec<Record> {
    distinct_by(rows, |row| row)
}

fn distinct_by<R>(rows: Vec<R>, shape: impl Fn(&R) -> &Record) -> Vec<R> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(Value::Object(shape(row).clone()).to_string()))
        .collect()
}

/// Unwinds a collection field: one output row per element
fn select_many(
    rows: Vec<Record>,
    operation: &QueryOperation,
    schema: &EntitySchema,
) -> QueryResult<Vec<Record>> {
    let field = operation
        .string_parameter("field")
        .ok_or_else(|| QueryError::InvalidOperation("SelectMany requires a field".into()))?;
    match schema.field_type(field) {
        Some(FieldType::Array { .. }) => {}
        Some(other) => {
            return Err(QueryError::InvalidOperation(format!(
                "SelectMany target '{}' is {}, not a collection",
                field,
                other.type_name()
            )))
        }
        None => {
            return Err(QueryError::UnknownField {
                entity: schema.name().to_string(),
                field: field.to_string(),
            })
        }
    }

    let mut output = Vec::new();
    for row in rows {
        if let Some(Value::Array(items)) = row.get(field) {
            for item in items {
                let mut flattened = row.clone();
                flattened.insert(field.to_string(), item.clone());
                output.push(flattened);
            }
        }
    }
    Ok(output)
}

fn quantified(
    rows: Vec<Record>,
    kind: OperationKind,
    operation: &QueryOperation,
    schema: &EntitySchema,
) -> QueryResult<Vec<Record>> {
    let collection = operation.string_parameter("collection").ok_or_else(|| {
        QueryError::InvalidOperation(format!("{} requires a collection", kind))
    })?;
    let conditions = operation
        .parameter("predicate")
        .ok_or_else(|| QueryError::InvalidOperation(format!("{} requires a predicate", kind)))
        .and_then(|p| {
            parse_predicate(p).map_err(|reason| {
                QueryError::InvalidOperation(format!("{} predicate: {}", kind, reason))
            })
        })?;

    let predicate = PredicateCompiler::new(schema.name(), schema.fields()).compile_quantified(
        kind == OperationKind::All,
        collection,
        &conditions,
    )?;
    Ok(rows
        .into_iter()
        .filter(|row| PredicateFilter::matches(row, &predicate))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> EntitySchema {
        EntitySchema::new("User")
            .with_field("Id", FieldType::Int)
            .with_field("Name", FieldType::String)
            .with_field(
                "Orders",
                FieldType::array_of(FieldType::object([("Total", FieldType::Float)])),
            )
    }

    fn rows() -> Vec<Record> {
        vec![
            json!({"Id": 1, "Name": "Ada", "Orders": [{"Total": 5.0}, {"Total": 50.0}]}),
            json!({"Id": 2, "Name": "Linus", "Orders": [{"Total": 1.0}]}),
            json!({"Id": 3, "Name": "Grace", "Orders": []}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    fn ids(rows: &[Record]) -> Vec<i64> {
        rows.iter().map(|r| r["Id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_skip_take_reverse_in_order() {
        let ops = vec![
            QueryOperation::new("Reverse"),
            QueryOperation::new("Skip").with_parameter("count", json!(1)),
            QueryOperation::new("Take").with_parameter("count", json!(1)),
        ];
        let out = apply_pre_projection(rows(), &ops, &schema(), 200).unwrap();
        assert_eq!(ids(&out), vec![2]);

        let ops = vec![
            QueryOperation::new("Take").with_parameter("count", json!(1)),
            QueryOperation::new("Reverse"),
        ];
        let out = apply_pre_projection(rows(), &ops, &schema(), 200).unwrap();
        assert_eq!(ids(&out), vec![1]);
    }

    #[test]
    fn test_reverse_parity() {
        let reverse = || QueryOperation::new("reverse");
        assert!(!reverses_order(&[]).unwrap());
        assert!(reverses_order(&[reverse()]).unwrap());
        assert!(!reverses_order(&[reverse(), QueryOperation::new("Distinct"), reverse()]).unwrap());
        assert!(reverses_order(&[QueryOperation::new("Shuffle")]).is_err());
    }

    #[test]
    fn test_post_projection_distinct_by_shape() {
        let pairs: Vec<(i64, Record)> = vec![
            (1, json!({"Name": "Ada"}).as_object().cloned().unwrap()),
            (2, json!({"Name": "Ada"}).as_object().cloned().unwrap()),
        ];
        let out = apply_post_projection_by(pairs, &[QueryOperation::new("Distinct")], |(_, r)| r)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, 1);
    }

    #[test]
    fn test_take_clamped_to_max() {
        let ops = vec![QueryOperation::new("Take").with_parameter("count", json!(500))];
        let out = apply_pre_projection(rows(), &ops, &schema(), 2).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_select_many_unwinds() {
        let ops = vec![QueryOperation::new("SelectMany").with_parameter("field", json!("Orders"))];
        let out = apply_pre_projection(rows(), &ops, &schema(), 200).unwrap();
        assert_eq!(ids(&out), vec![1, 1, 2]);
        assert_eq!(out[1]["Orders"], json!({"Total": 50.0}));

        let ops = vec![QueryOperation::new("SelectMany").with_parameter("field", json!("Name"))];
        let err = apply_pre_projection(rows(), &ops, &schema(), 200).unwrap_err();
        assert_eq!(err.code(), "AERO_QUERY_INVALID_OPERATION");
    }

    #[test]
    fn test_any_and_all() {
        let any = QueryOperation::new("Any")
            .with_parameter("collection", json!("Orders"))
            .with_parameter(
                "predicate",
                json!({"field": "Total", "operator": "gt", "value": 10}),
            );
        let out = apply_pre_projection(rows(), &[any], &schema(), 200).unwrap();
        assert_eq!(ids(&out), vec![1]);

        let all = QueryOperation::new("All")
            .with_parameter("collection", json!("Orders"))
            .with_parameter(
                "predicate",
                json!([{"field": "Total", "operator": "lt", "value": 10}]),
            );
        let out = apply_pre_projection(rows(), &[all], &schema(), 200).unwrap();
        assert_eq!(ids(&out), vec![2, 3]);
    }

    #[test]
    fn test_post_projection_operations() {
        let projected: Vec<Record> = vec![
            json!({"Name": "Ada"}),
            json!({"Name": "Ada"}),
            json!({"Name": "Linus"}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();

        let out = apply_post_projection(projected.clone(), &[QueryOperation::new("Distinct")]).unwrap();
        assert_eq!(out.len(), 2);
        let out = apply_post_projection(projected.clone(), &[QueryOperation::new("Single")]).unwrap();
        assert_eq!(out.len(), 2);
        let out = apply_post_projection(projected, &[QueryOperation::new("firstordefault")]).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_unknown_operation_is_fatal() {
        let err = apply_pre_projection(rows(), &[QueryOperation::new("Shuffle")], &schema(), 200)
            .unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedOperator(op) if op == "Shuffle"));
    }
}
