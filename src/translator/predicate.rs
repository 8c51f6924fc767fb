//! Predicate IR and the filter compiler
//!
//! Filter trees are compiled once per request into a small typed IR. Values
//! are coerced to the declared field type here, so evaluation never guesses
//! and storage backends receive operands they can push down as-is.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::query::{FilterCondition, FilterGroup, FilterLeaf, FilterOperator, LogicalOperator};
use crate::schema::FieldType;

use super::errors::{QueryError, QueryResult};

/// A typed comparison operand
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
}

impl Scalar {
    /// Reads `value` as the scalar form of `field_type`
    pub fn coerce(value: &Value, field_type: &FieldType) -> Option<Scalar> {
        match (field_type, value) {
            (FieldType::String, Value::String(s)) => Some(Scalar::Text(s.clone())),
            (FieldType::Int, Value::Number(n)) => n.as_i64().map(Scalar::Int),
            (FieldType::Float, Value::Number(n)) => n.as_f64().map(Scalar::Float),
            (FieldType::Bool, Value::Bool(b)) => Some(Scalar::Bool(*b)),
            (FieldType::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| Scalar::DateTime(d.with_timezone(&Utc))),
            (FieldType::Uuid, Value::String(s)) => Uuid::parse_str(s).ok().map(Scalar::Uuid),
            _ => None,
        }
    }

    /// Declared type this operand was coerced to
    pub fn field_type(&self) -> FieldType {
        match self {
            Scalar::Bool(_) => FieldType::Bool,
            Scalar::Int(_) => FieldType::Int,
            Scalar::Float(_) => FieldType::Float,
            Scalar::Text(_) => FieldType::String,
            Scalar::DateTime(_) => FieldType::DateTime,
            Scalar::Uuid(_) => FieldType::Uuid,
        }
    }

    /// Reads a stored value in this operand's type
    pub fn read_like(&self, value: &Value) -> Option<Scalar> {
        Scalar::coerce(value, &self.field_type())
    }

    /// Ordering between operands of the same type; `None` across types
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::Float(a), Scalar::Float(b)) => a.partial_cmp(b),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::DateTime(a), Scalar::DateTime(b)) => Some(a.cmp(b)),
            (Scalar::Uuid(a), Scalar::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Contains,
    StartsWith,
    EndsWith,
    EqualsIgnoreCase,
}

/// Compiled boolean predicate over one record
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record
    Always,
    Compare {
        field: String,
        op: CompareOp,
        value: Scalar,
    },
    /// String-only operators
    Text {
        field: String,
        op: TextOp,
        value: String,
    },
    In {
        field: String,
        values: Vec<Scalar>,
    },
    /// `isnull`, or `isnotnull` when negated
    Null {
        field: String,
        negated: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// Some element of an array-of-objects field matches
    Any {
        collection: String,
        predicate: Box<Predicate>,
    },
    /// Every element of an array-of-objects field matches
    All {
        collection: String,
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    /// Conjunction with `Always` operands folded away
    pub fn and(predicates: Vec<Predicate>) -> Predicate {
        let mut operands: Vec<Predicate> = predicates
            .into_iter()
            .filter(|p| !matches!(p, Predicate::Always))
            .collect();
        match operands.len() {
            0 => Predicate::Always,
            1 => operands.pop().unwrap_or(Predicate::Always),
            _ => Predicate::And(operands),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Predicate::Always)
    }
}

/// Compiles filter trees against one field map
///
/// The field map is an entity's schema, the element fields of a collection,
/// or the synthetic columns of a grouped row.
pub struct PredicateCompiler<'a> {
    scope: String,
    fields: &'a BTreeMap<String, FieldType>,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(scope: impl Into<String>, fields: &'a BTreeMap<String, FieldType>) -> Self {
        Self {
            scope: scope.into(),
            fields,
        }
    }

    /// Compiles a condition list; the list is an implicit AND
    pub fn compile_all(&self, conditions: &[FilterCondition]) -> QueryResult<Predicate> {
        let compiled = conditions
            .iter()
            .map(|c| self.compile(c))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Predicate::and(compiled))
    }

    pub fn compile(&self, condition: &FilterCondition) -> QueryResult<Predicate> {
        match condition {
            FilterCondition::Leaf(leaf) => self.compile_leaf(leaf),
            FilterCondition::Group(group) => self.compile_group(group),
        }
    }

    /// Compiles an `Any`/`All` element predicate over `collection`
    pub fn compile_quantified(
        &self,
        universal: bool,
        collection: &str,
        conditions: &[FilterCondition],
    ) -> QueryResult<Predicate> {
        let field_type = self.field_type(collection)?;
        let element_fields = match field_type {
            FieldType::Array { element_type } => element_type.member_fields(),
            _ => None,
        }
        .ok_or_else(|| {
            QueryError::InvalidOperation(format!(
                "'{}' on {} is not a collection of objects",
                collection, self.scope
            ))
        })?;

        let element_scope = format!("{}.{}", self.scope, collection);
        let inner = PredicateCompiler::new(element_scope, element_fields).compile_all(conditions)?;
        let predicate = Box::new(inner);
        let collection = collection.to_string();
        Ok(if universal {
            Predicate::All {
                collection,
                predicate,
            }
        } else {
            Predicate::Any {
                collection,
                predicate,
            }
        })
    }

    fn compile_group(&self, group: &FilterGroup) -> QueryResult<Predicate> {
        let logic = LogicalOperator::parse(group.logic.as_deref()).ok_or_else(|| {
            QueryError::UnsupportedOperator(group.logic.clone().unwrap_or_default())
        })?;
        let children = group
            .conditions
            .iter()
            .map(|c| self.compile(c))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(match logic {
            LogicalOperator::And => Predicate::and(children),
            LogicalOperator::Or => Predicate::Or(children),
        })
    }

    fn field_type(&self, field: &str) -> QueryResult<&'a FieldType> {
        self.fields.get(field).ok_or_else(|| QueryError::UnknownField {
            entity: self.scope.clone(),
            field: field.to_string(),
        })
    }

    fn compile_leaf(&self, leaf: &FilterLeaf) -> QueryResult<Predicate> {
        let field_type = self.field_type(&leaf.field)?;
        let op = FilterOperator::parse(&leaf.operator)
            .ok_or_else(|| QueryError::UnsupportedOperator(leaf.operator.clone()))?;
        let field = leaf.field.clone();

        if op.forbids_value() {
            return Ok(Predicate::Null {
                field,
                negated: op == FilterOperator::IsNotNull,
            });
        }

        let value = leaf
            .value
            .as_ref()
            .ok_or_else(|| QueryError::invalid_value(&leaf.field, "a value"))?;

        if op.is_text() {
            if *field_type != FieldType::String {
                return Err(QueryError::InvalidOperation(format!(
                    "operator '{}' requires a string field, '{}' is {}",
                    op,
                    leaf.field,
                    field_type.type_name()
                )));
            }
            let text = value
                .as_str()
                .ok_or_else(|| QueryError::invalid_value(&leaf.field, "string"))?;
            let text_op = match op {
                FilterOperator::Contains => TextOp::Contains,
                FilterOperator::StartsWith => TextOp::StartsWith,
                FilterOperator::EndsWith => TextOp::EndsWith,
                _ => TextOp::EqualsIgnoreCase,
            };
            return Ok(Predicate::Text {
                field,
                op: text_op,
                value: text.to_string(),
            });
        }

        if !field_type.is_scalar() {
            return Err(QueryError::InvalidOperation(format!(
                "operator '{}' cannot be applied to {} field '{}'",
                op,
                field_type.type_name(),
                leaf.field
            )));
        }
        let coerce = |v: &Value| {
            Scalar::coerce(v, field_type)
                .ok_or_else(|| QueryError::invalid_value(&leaf.field, field_type.type_name()))
        };

        let compare_op = match op {
            FilterOperator::Eq => CompareOp::Eq,
            FilterOperator::Ne => CompareOp::Ne,
            FilterOperator::Lt => CompareOp::Lt,
            FilterOperator::Lte => CompareOp::Lte,
            FilterOperator::Gt => CompareOp::Gt,
            FilterOperator::Gte => CompareOp::Gte,
            _ => {
                // `in` is the only operator left
                let items = value.as_array().ok_or_else(|| {
                    QueryError::invalid_value(
                        &leaf.field,
                        format!("array of {}", field_type.type_name()),
                    )
                })?;
                let values = items.iter().map(coerce).collect::<QueryResult<Vec<_>>>()?;
                return Ok(Predicate::In { field, values });
            }
        };
        Ok(Predicate::Compare {
            field,
            op: compare_op,
            value: coerce(value)?,
        })
    }
}
