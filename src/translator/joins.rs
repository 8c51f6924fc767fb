//! Join execution
//!
//! `join` emits one row per matching pair and copies each selected joined
//! field in as `<Entity>.<field>`, plus the joined identity so the pair
//! stays uniquely ordered. `groupjoin` keeps every root row and
//! attaches the matches as an array member named after the joined entity,
//! each element carrying only the selected fields.

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::query::{JoinKind, JoinSpecification};
use crate::schema::{EntitySchema, Record};
use crate::storage::StorageProvider;

use super::errors::{QueryError, QueryResult};
use super::predicate::Predicate;
use super::sorter::ResultSorter;

pub struct JoinExecutor<'a> {
    storage: &'a dyn StorageProvider,
    root: &'a EntitySchema,
    cancel: &'a CancellationToken,
}

impl<'a> JoinExecutor<'a> {
    pub fn new(
        storage: &'a dyn StorageProvider,
        root: &'a EntitySchema,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            storage,
            root,
            cancel,
        }
    }

    /// Applies `joins` in order. Joined scans add to `rows_examined`.
    pub fn apply(
        &self,
        mut rows: Vec<Record>,
        joins: &[JoinSpecification],
        rows_examined: &mut u64,
    ) -> QueryResult<Vec<Record>> {
        for join in joins {
            rows = self.apply_one(rows, join, rows_examined)?;
        }
        Ok(rows)
    }

    fn apply_one(
        &self,
        rows: Vec<Record>,
        join: &JoinSpecification,
        rows_examined: &mut u64,
    ) -> QueryResult<Vec<Record>> {
        let kind = JoinKind::parse(&join.kind)
            .ok_or_else(|| QueryError::InvalidOperation(format!("unknown join type '{}'", join.kind)))?;
        let joined = self
            .storage
            .schema(&join.entity)
            .ok_or_else(|| QueryError::UnknownEntity(join.entity.clone()))?;

        for (source, target) in &join.on {
            self.require_field(self.root, source)?;
            self.require_field(&joined, target)?;
        }
        for field in &join.select {
            self.require_field(&joined, field)?;
        }

        let scan = self
            .storage
            .scan(joined.name(), &Predicate::Always, self.cancel)?;
        *rows_examined += scan.rows_examined;

        let mut output = Vec::with_capacity(rows.len());
        for row in rows {
            if self.cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }
            let matches = scan.records.iter().filter(|candidate| {
                join.on.iter().all(|(source, target)| {
                    ResultSorter::values_equal(row.get(source), candidate.get(target))
                })
            });

            match kind {
                JoinKind::Join => {
                    for candidate in matches {
                        let mut combined = row.clone();
                        combined.insert(
                            joined_identity(&joined),
                            candidate.get(joined.identity()).cloned().unwrap_or(Value::Null),
                        );
                        for field in &join.select {
                            let value = candidate.get(field).cloned().unwrap_or(Value::Null);
                            combined.insert(format!("{}.{}", joined.name(), field), value);
                        }
                        output.push(combined);
                    }
                }
                JoinKind::GroupJoin => {
                    let members: Vec<Value> = matches
                        .map(|candidate| {
                            let element: Map<String, Value> = join
                                .select
                                .iter()
                                .map(|f| (f.clone(), candidate.get(f).cloned().unwrap_or(Value::Null)))
                                .collect();
                            Value::Object(element)
                        })
                        .collect();
                    let mut combined = row;
                    combined.insert(joined.name().to_string(), Value::Array(members));
                    output.push(combined);
                }
            }
        }
        Ok(output)
    }

    fn require_field(&self, schema: &EntitySchema, field: &str) -> QueryResult<()> {
        if schema.has_field(field) {
            Ok(())
        } else {
            Err(QueryError::UnknownField {
                entity: schema.name().to_string(),
                field: field.to_string(),
            })
        }
    }
}

/// Member carrying the joined row's identity after an inner join
pub fn joined_identity(joined: &EntitySchema) -> String {
    format!("{}.{}", joined.name(), joined.identity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::collections::BTreeMap;

    const DATA: &str = r#"{
        "entities": [
            {
                "name": "User",
                "fields": {"Id": {"type": "int"}, "Name": {"type": "string"}},
                "records": [{"Id": 1, "Name": "Ada"}, {"Id": 2, "Name": "Linus"}]
            },
            {
                "name": "Order",
                "fields": {
                    "Id": {"type": "int"},
                    "UserId": {"type": "int"},
                    "Total": {"type": "float"},
                    "Cost": {"type": "float"}
                },
                "records": [
                    {"Id": 10, "UserId": 1, "Total": 5.0, "Cost": 1.0},
                    {"Id": 11, "UserId": 1, "Total": 7.5, "Cost": 2.0}
                ]
            }
        ]
    }"#;

    fn spec(kind: &str) -> JoinSpecification {
        let mut on = BTreeMap::new();
        on.insert("Id".to_string(), "UserId".to_string());
        JoinSpecification {
            kind: kind.into(),
            entity: "order".into(),
            on,
            select: vec!["Total".into()],
        }
    }

    fn run(kind: &str) -> (Vec<Record>, u64) {
        let storage = MemoryStorage::from_json(DATA).unwrap();
        let cancel = CancellationToken::new();
        let root = storage.schema("User").unwrap();
        let users = storage.scan("User", &Predicate::Always, &cancel).unwrap();
        let mut examined = users.rows_examined;
        let rows = JoinExecutor::new(&storage, &root, &cancel)
            .apply(users.records, &[spec(kind)], &mut examined)
            .unwrap();
        (rows, examined)
    }

    #[test]
    fn test_inner_join_adds_selected_members() {
        let (rows, examined) = run("join");
        assert_eq!(rows.len(), 2);
        assert_eq!(examined, 4);
        assert_eq!(rows[0]["Order.Total"], json!(5.0));
        assert_eq!(rows[1]["Order.Total"], json!(7.5));
        assert_eq!(rows[0]["Order.Id"], json!(10));
        assert_eq!(rows[1]["Order.Id"], json!(11));
        assert!(!rows[0].contains_key("Order.Cost"));
    }

    #[test]
    fn test_group_join_keeps_unmatched_rows() {
        let (rows, _) = run("groupjoin");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Order"], json!([{"Total": 5.0}, {"Total": 7.5}]));
        assert_eq!(rows[1]["Order"], json!([]));
    }

    #[test]
    fn test_unknown_join_field() {
        let storage = MemoryStorage::from_json(DATA).unwrap();
        let cancel = CancellationToken::new();
        let root = storage.schema("User").unwrap();
        let mut join = spec("join");
        join.select = vec!["Margin".into()];
        let err = JoinExecutor::new(&storage, &root, &cancel)
            .apply(Vec::new(), &[join], &mut 0)
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownField { ref field, .. } if field == "Margin"));
    }
}
