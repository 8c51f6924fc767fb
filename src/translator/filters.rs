//! Predicate evaluation over records
//!
//! Evaluates compiled predicates strictly. Stored values are read in the
//! operand's declared type; a value that cannot be read that way never
//! matches.

use serde_json::Value;

use crate::schema::Record;

use super::predicate::{CompareOp, Predicate, Scalar, TextOp};

/// Evaluates predicates against records
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a record satisfies `predicate`
    pub fn matches(record: &Record, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Always => true,
            Predicate::Compare { field, op, value } => {
                Self::compare_match(record.get(field), *op, value)
            }
            Predicate::Text { field, op, value } => match record.get(field) {
                Some(Value::String(actual)) => Self::text_match(actual, *op, value),
                _ => false,
            },
            Predicate::In { field, values } => Self::in_match(record.get(field), values),
            Predicate::Null { field, negated } => {
                let is_null = record.get(field).map(Value::is_null).unwrap_or(true);
                is_null != *negated
            }
            Predicate::And(children) => children.iter().all(|p| Self::matches(record, p)),
            Predicate::Or(children) => children.iter().any(|p| Self::matches(record, p)),
            Predicate::Any {
                collection,
                predicate,
            } => match record.get(collection) {
                Some(Value::Array(items)) => items.iter().any(|item| match item {
                    Value::Object(element) => Self::matches(element, predicate),
                    _ => false,
                }),
                _ => false,
            },
            Predicate::All {
                collection,
                predicate,
            } => match record.get(collection) {
                Some(Value::Array(items)) => items.iter().all(|item| match item {
                    Value::Object(element) => Self::matches(element, predicate),
                    _ => false,
                }),
                // A null collection has no elements to violate the predicate
                None | Some(Value::Null) => true,
                Some(_) => false,
            },
        }
    }

    fn compare_match(actual: Option<&Value>, op: CompareOp, expected: &Scalar) -> bool {
        let actual = match actual {
            Some(v) if !v.is_null() => v,
            // Null differs from every value and orders against none
            _ => return op == CompareOp::Ne,
        };
        match expected.read_like(actual) {
            Some(actual) => actual
                .compare(expected)
                .map(|ordering| op.holds(ordering))
                .unwrap_or(false),
            None => false,
        }
    }

    fn text_match(actual: &str, op: TextOp, expected: &str) -> bool {
        match op {
            TextOp::Contains => actual.contains(expected),
            TextOp::StartsWith => actual.starts_with(expected),
            TextOp::EndsWith => actual.ends_with(expected),
            TextOp::EqualsIgnoreCase => actual.to_lowercase() == expected.to_lowercase(),
        }
    }

    fn in_match(actual: Option<&Value>, values: &[Scalar]) -> bool {
        let actual = match actual {
            Some(v) if !v.is_null() => v,
            _ => return false,
        };
        values.iter().any(|expected| {
            expected
                .read_like(actual)
                .and_then(|a| a.compare(expected))
                .map(|o| o == std::cmp::Ordering::Equal)
                .unwrap_or(false)
        })
    }
}
