//! Grouped execution
//!
//! Produces one row per distinct combination of group field values:
//! `{group fields..., aggregate aliases...}`. `Having` is compiled against
//! the group row's columns and applied after aggregation. Rows are ordered
//! by the requested sort, then by the group fields, so paging over groups
//! is deterministic.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde_json::{Number, Value};

use crate::query::{AbstractQuery, AggregateFunction, AggregationSpecification, SortDirection};
use crate::schema::{EntitySchema, FieldType, Record};

use super::errors::{QueryError, QueryResult};
use super::filters::PredicateFilter;
use super::predicate::PredicateCompiler;
use super::sorter::{ResultSorter, SortKey};

/// Group rows plus the keys they must be ordered and paged by
#[derive(Debug)]
pub struct GroupedRows {
    pub rows: Vec<Record>,
    pub sort_keys: Vec<SortKey>,
}

/// One aggregation resolved against the schema
struct Aggregate<'a> {
    function: AggregateFunction,
    field: Option<(&'a str, &'a FieldType)>,
    output: String,
}

impl<'a> Aggregate<'a> {
    fn resolve(spec: &'a AggregationSpecification, schema: &'a EntitySchema) -> QueryResult<Self> {
        let function = AggregateFunction::parse(&spec.function)
            .ok_or_else(|| QueryError::UnsupportedOperator(spec.function.clone()))?;
        let field = match spec.field.as_deref().filter(|f| !f.trim().is_empty()) {
            Some(name) => {
                let field_type = schema.field_type(name).ok_or_else(|| QueryError::UnknownField {
                    entity: schema.name().to_string(),
                    field: name.to_string(),
                })?;
                Some((name, field_type))
            }
            None if function.requires_field() => {
                return Err(QueryError::InvalidOperation(format!(
                    "{} requires a field",
                    function.as_str()
                )))
            }
            None => None,
        };

        if let Some((name, field_type)) = field {
            let ok = match function {
                AggregateFunction::Count => true,
                AggregateFunction::Sum | AggregateFunction::Avg => field_type.is_numeric(),
                AggregateFunction::Min | AggregateFunction::Max => field_type.is_scalar(),
            };
            if !ok {
                return Err(QueryError::InvalidOperation(format!(
                    "{} cannot be applied to {} field '{}'",
                    function.as_str(),
                    field_type.type_name(),
                    name
                )));
            }
        }

        Ok(Self {
            function,
            field,
            output: spec.output_name(),
        })
    }

    /// Column type seen by `Having`
    fn output_type(&self) -> FieldType {
        match (self.function, self.field) {
            (AggregateFunction::Count, _) => FieldType::Int,
            (AggregateFunction::Avg, _) => FieldType::Float,
            (_, Some((_, field_type))) => field_type.clone(),
            (_, None) => FieldType::Int,
        }
    }

    fn compute(&self, members: &[&Record]) -> QueryResult<Value> {
        let values = || {
            members
                .iter()
                .filter_map(move |r| self.field.and_then(|(name, _)| r.get(name)))
                .filter(|v| !v.is_null())
        };

        match self.function {
            AggregateFunction::Count => {
                let count = match self.field {
                    None => members.len(),
                    Some(_) => values().count(),
                };
                Ok(Value::from(count as u64))
            }
            AggregateFunction::Sum => match self.field {
                Some((name, FieldType::Int)) => values()
                    .filter_map(Value::as_i64)
                    .try_fold(0i64, |acc, v| acc.checked_add(v))
                    .map(Value::from)
                    .ok_or_else(|| {
                        QueryError::InvalidOperation(format!("sum of '{}' overflows int", name))
                    }),
                _ => Ok(float(values().filter_map(Value::as_f64).sum())),
            },
            AggregateFunction::Avg => {
                let numbers: Vec<f64> = values().filter_map(Value::as_f64).collect();
                if numbers.is_empty() {
                    Ok(Value::Null)
                } else {
                    Ok(float(numbers.iter().sum::<f64>() / numbers.len() as f64))
                }
            }
            AggregateFunction::Min => Ok(values()
                .min_by(|a, b| self.compare(a, b))
                .cloned()
                .unwrap_or(Value::Null)),
            AggregateFunction::Max => Ok(values()
                .max_by(|a, b| self.compare(a, b))
                .cloned()
                .unwrap_or(Value::Null)),
        }
    }
}

impl Aggregate<'_> {
    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match self.field {
            Some((_, FieldType::DateTime)) => ResultSorter::compare_temporal(Some(a), Some(b)),
            _ => ResultSorter::compare_values(Some(a), Some(b)),
        }
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// Groups, aggregates, filters by `Having` and derives the ordering keys
pub fn aggregate(
    records: Vec<Record>,
    query: &AbstractQuery,
    schema: &EntitySchema,
) -> QueryResult<GroupedRows> {
    let group_by = query
        .group_by
        .as_ref()
        .ok_or_else(|| QueryError::InvalidOperation("grouped execution without groupBy".into()))?;

    let mut columns: BTreeMap<String, FieldType> = BTreeMap::new();
    for field in &group_by.fields {
        let field_type = schema.field_type(field).ok_or_else(|| QueryError::UnknownField {
            entity: schema.name().to_string(),
            field: field.clone(),
        })?;
        columns.insert(field.clone(), field_type.clone());
    }
    let aggregates = query
        .aggregations
        .iter()
        .map(|spec| Aggregate::resolve(spec, schema))
        .collect::<QueryResult<Vec<_>>>()?;
    for aggregate in &aggregates {
        columns.insert(aggregate.output.clone(), aggregate.output_type());
    }

    // Group membership keyed by the serialized key tuple, first-seen order
    let mut order: Vec<Vec<Value>> = Vec::new();
    let mut groups: HashMap<String, Vec<&Record>> = HashMap::new();
    for record in &records {
        let key: Vec<Value> = group_by
            .fields
            .iter()
            .map(|f| record.get(f).cloned().unwrap_or(Value::Null))
            .collect();
        let id = Value::Array(key.clone()).to_string();
        let members = groups.entry(id).or_insert_with(|| {
            order.push(key);
            Vec::new()
        });
        members.push(record);
    }

    let scope = format!("{} groups", schema.name());
    let having = PredicateCompiler::new(scope, &columns).compile_all(&group_by.having)?;

    let mut rows = Vec::with_capacity(order.len());
    for key in order {
        let id = Value::Array(key.clone()).to_string();
        let members = groups.get(&id).map(Vec::as_slice).unwrap_or(&[]);

        let mut row = Record::new();
        for (field, value) in group_by.fields.iter().zip(key) {
            row.insert(field.clone(), value);
        }
        for aggregate in &aggregates {
            row.insert(aggregate.output.clone(), aggregate.compute(members)?);
        }
        if PredicateFilter::matches(&row, &having) {
            rows.push(row);
        }
    }

    let mut sort_keys = Vec::new();
    for spec in &query.sort {
        if !columns.contains_key(&spec.field) {
            return Err(QueryError::SortFieldNotProjected(spec.field.clone()));
        }
        let direction = SortDirection::parse(&spec.direction).ok_or_else(|| {
            QueryError::InvalidOperation(format!("unknown sort direction '{}'", spec.direction))
        })?;
        sort_keys.push(SortKey::new(spec.field.clone(), direction).typed(columns.get(&spec.field)));
    }
    for field in &group_by.fields {
        if !sort_keys.iter().any(|k| k.field == *field) {
            sort_keys.push(SortKey::asc(field.clone()).typed(columns.get(field)));
        }
    }

    Ok(GroupedRows { rows, sort_keys })
}
