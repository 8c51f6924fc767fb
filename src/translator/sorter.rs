//! Result sorting for query execution
//!
//! Multi-key, stable, deterministic. Keys name fields of the rows being
//! sorted (projected members, or group columns on the grouped path).

use std::cmp::Ordering;

use chrono::DateTime;
use serde_json::Value;

use crate::query::SortDirection;
use crate::schema::{FieldType, Record};

/// One ordering key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
    /// Column is declared `datetime`; strings compare as instants
    pub temporal: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
            temporal: false,
        }
    }

    /// Takes string semantics from the column's declared type
    pub fn typed(mut self, field_type: Option<&FieldType>) -> Self {
        self.temporal = matches!(field_type, Some(FieldType::DateTime));
        self
    }

    /// Same key, opposite direction
    pub fn reversed(&self) -> Self {
        let direction = match self.direction {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        };
        Self {
            direction,
            ..self.clone()
        }
    }

    /// Applies this key's direction to an ascending ordering
    pub fn orient(&self, ordering: Ordering) -> Ordering {
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Directed comparison of two values of this key's column
    pub fn compare(&self, a: Option<&Value>, b: Option<&Value>) -> Ordering {
        let ordering = if self.temporal {
            ResultSorter::compare_temporal(a, b)
        } else {
            ResultSorter::compare_values(a, b)
        };
        self.orient(ordering)
    }
}

/// Sorts result records
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts records by `keys` in list order. Stable.
    pub fn sort(records: &mut [Record], keys: &[SortKey]) {
        if keys.is_empty() {
            return;
        }
        records.sort_by(|a, b| Self::compare(a, b, keys));
    }

    /// Lexicographic comparison over `keys`
    pub fn compare(a: &Record, b: &Record, keys: &[SortKey]) -> Ordering {
        keys.iter()
            .map(|key| key.compare(a.get(&key.field), b.get(&key.field)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    /// Compares two JSON values for sorting.
    ///
    /// Ordering rules:
    /// - missing == null, and sorts first
    /// - null < bool < number < string
    /// - integers compare exactly, mixed numbers as f64
    /// - strings compare lexically
    pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        let a = a.unwrap_or(&Value::Null);
        let b = b.unwrap_or(&Value::Null);

        let type_order = |v: &Value| -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::String(_) => 3,
                Value::Array(_) => 4,
                Value::Object(_) => 5,
            }
        };

        let a_type = type_order(a);
        let b_type = type_order(b);
        if a_type != b_type {
            return a_type.cmp(&b_type);
        }

        match (a, b) {
            (Value::Bool(a_b), Value::Bool(b_b)) => a_b.cmp(b_b),
            (Value::Number(a_n), Value::Number(b_n)) => {
                if let (Some(ai), Some(bi)) = (a_n.as_i64(), b_n.as_i64()) {
                    return ai.cmp(&bi);
                }
                let a_f = a_n.as_f64().unwrap_or(0.0);
                let b_f = b_n.as_f64().unwrap_or(0.0);
                a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
            }
            (Value::String(a_s), Value::String(b_s)) => a_s.cmp(b_s),
            _ => Ordering::Equal, // Arrays and objects not compared
        }
    }

    /// Comparison for `datetime` columns.
    ///
    /// RFC 3339 strings compare as instants and sort before any string that
    /// does not parse; unparsable strings compare lexically among themselves.
    /// Everything else follows [`compare_values`](Self::compare_values).
    pub fn compare_temporal(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (Some(Value::String(a_s)), Some(Value::String(b_s))) => {
                match (DateTime::parse_from_rfc3339(a_s), DateTime::parse_from_rfc3339(b_s)) {
                    (Ok(a_t), Ok(b_t)) => a_t.cmp(&b_t),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => a_s.cmp(b_s),
                }
            }
            _ => Self::compare_values(a, b),
        }
    }

    /// Equality under [`compare_values`](Self::compare_values); null never equals
    pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
        let present = |v: Option<&Value>| v.map(|v| !v.is_null()).unwrap_or(false);
        present(a) && present(b) && Self::compare_values(a, b) == Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_record(id: i64, age: Value) -> Record {
        json!({"Id": id, "Age": age}).as_object().cloned().unwrap()
    }

    fn ids(records: &[Record]) -> Vec<i64> {
        records.iter().map(|r| r["Id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_sort_ascending() {
        let mut records = vec![
            make_record(3, json!(30)),
            make_record(1, json!(20)),
            make_record(2, json!(25)),
        ];
        ResultSorter::sort(&mut records, &[SortKey::asc("Age")]);
        assert_eq!(ids(&records), vec![1, 2, 3]);
    }

    #[test]
    fn test_sort_descending() {
        let mut records = vec![
            make_record(3, json!(30)),
            make_record(1, json!(20)),
            make_record(2, json!(25)),
        ];
        ResultSorter::sort(&mut records, &[SortKey::desc("Age")]);
        assert_eq!(ids(&records), vec![3, 2, 1]);
    }

    #[test]
    fn test_secondary_key_breaks_ties() {
        let mut records = vec![
            make_record(3, json!(25)),
            make_record(1, json!(25)),
            make_record(2, json!(20)),
        ];
        ResultSorter::sort(&mut records, &[SortKey::desc("Age"), SortKey::asc("Id")]);
        assert_eq!(ids(&records), vec![1, 3, 2]);
    }

    #[test]
    fn test_nulls_sort_first() {
        let mut records = vec![make_record(1, json!(5)), make_record(2, Value::Null)];
        ResultSorter::sort(&mut records, &[SortKey::asc("Age")]);
        assert_eq!(ids(&records), vec![2, 1]);
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let a = json!(9_007_199_254_740_993i64);
        let b = json!(9_007_199_254_740_992i64);
        assert_eq!(ResultSorter::compare_values(Some(&a), Some(&b)), Ordering::Greater);
    }

    #[test]
    fn test_timestamps_compare_as_instants() {
        let a = json!("2024-01-01T10:00:00+02:00");
        let b = json!("2024-01-01T09:00:00Z");
        assert_eq!(ResultSorter::compare_temporal(Some(&a), Some(&b)), Ordering::Less);
        // Untyped columns keep plain string order
        assert_eq!(ResultSorter::compare_values(Some(&a), Some(&b)), Ordering::Greater);
    }

    #[test]
    fn test_mixed_timestamp_column_is_a_total_order() {
        let a = json!("2024-01-01T10:00:00+02:00");
        let b = json!("2024-01-01T09:00:00Z");
        let c = json!("2024-01-01T09:30:00x");
        let cmp = |x: &Value, y: &Value| ResultSorter::compare_temporal(Some(x), Some(y));
        assert_eq!(cmp(&a, &b), Ordering::Less);
        assert_eq!(cmp(&b, &c), Ordering::Less);
        assert_eq!(cmp(&a, &c), Ordering::Less);

        let key = SortKey::asc("At").typed(Some(&FieldType::DateTime));
        let mut records: Vec<Record> = [&c, &b, &a]
            .iter()
            .enumerate()
            .map(|(i, at)| json!({"Id": i, "At": at}).as_object().cloned().unwrap())
            .collect();
        ResultSorter::sort(&mut records, &[key]);
        let order: Vec<&Value> = records.iter().map(|r| &r["At"]).collect();
        assert_eq!(order, vec![&a, &b, &c]);
    }

    #[test]
    fn test_reversed_key_flips_direction() {
        let key = SortKey::desc("At").typed(Some(&FieldType::DateTime));
        let flipped = key.reversed();
        assert_eq!(flipped.direction, SortDirection::Asc);
        assert!(flipped.temporal);
        assert_eq!(flipped.reversed(), key);
    }

    #[test]
    fn test_values_equal_ignores_nulls() {
        assert!(ResultSorter::values_equal(Some(&json!(1)), Some(&json!(1.0))));
        assert!(!ResultSorter::values_equal(Some(&Value::Null), Some(&Value::Null)));
        assert!(!ResultSorter::values_equal(None, Some(&json!(1))));
    }
}
