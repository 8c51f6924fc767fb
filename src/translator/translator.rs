//! Query translator for aeroquery
//!
//! Compiles a validated query and executes it against a storage provider.
//!
//! Execution flow (strict order):
//! 1. Resolve the entity schema
//! 2. Resolve the projection binding entity -> T (ungrouped only)
//! 3. Compile filters into a predicate and scan with it pushed down
//! 4. Apply joins
//! 5. Apply pre-projection operations in request order
//! 6. Sort by source fields (identity, joined identities, or group fields
//!    as final tie-breakers; `Reverse` flips every key)
//! 7. Group and aggregate, or project through the binding
//! 8. Apply post-projection operations
//! 9. Page by cursor over source key values, count if requested, narrow
//!    to `select`
//! 10. Materialize rows as T
//!
//! Same validated query + same data = same items and same next cursor.

use std::any::type_name;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::observability::{log_event, Event, MetricsRegistry};
use crate::paging::Pager;
use crate::policy::ValidationConfig;
use crate::projection::{ProjectionBinding, ProjectionRegistry};
use crate::query::{
    AbstractQuery, JoinKind, PageInfo, QueryResponse, ResponseMeta, SortDirection,
};
use crate::schema::{EntitySchema, Record};
use crate::storage::StorageProvider;
use crate::validation::ValidatedQuery;

use super::errors::{QueryError, QueryResult};
use super::grouping;
use super::joins::{joined_identity, JoinExecutor};
use super::operations;
use super::predicate::{Predicate, PredicateCompiler};
use super::sorter::{ResultSorter, SortKey};

/// Translates validated queries into storage calls and shaped pages
pub struct QueryTranslator<'a> {
    storage: &'a dyn StorageProvider,
    projections: &'a ProjectionRegistry,
    config: &'a ValidationConfig,
    metrics: Option<&'a MetricsRegistry>,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(
        storage: &'a dyn StorageProvider,
        projections: &'a ProjectionRegistry,
        config: &'a ValidationConfig,
    ) -> Self {
        Self {
            storage,
            projections,
            config,
            metrics: None,
        }
    }

    /// Counts self-healing failures into `metrics`
    pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Executes `query`, producing one page of `T`
    pub fn execute<T: DeserializeOwned + 'static>(
        &self,
        query: &ValidatedQuery,
        cancel: &CancellationToken,
    ) -> QueryResult<QueryResponse<T>> {
        let query = query.query();

        // Step 1: Resolve the entity
        let schema = self
            .storage
            .schema(&query.entity)
            .ok_or_else(|| QueryError::UnknownEntity(query.entity.clone()))?;

        // Step 2: Projection binding; grouped rows have their own shape
        let binding = if query.is_grouped() {
            None
        } else {
            let binding = self.projections.get::<T>(schema.name()).ok_or_else(|| {
                QueryError::MissingProjection {
                    entity: schema.name().to_string(),
                    target: type_name::<T>(),
                }
            })?;
            Some(binding)
        };

        // Step 3: Filter push-down
        let predicate =
            PredicateCompiler::new(schema.name(), schema.fields()).compile_all(&query.filters)?;
        let scan = self.storage.scan(schema.name(), &predicate, cancel)?;
        let mut rows_examined = scan.rows_examined;

        // Step 4: Joins
        let rows = JoinExecutor::new(self.storage, &schema, cancel).apply(
            scan.records,
            &query.joins,
            &mut rows_examined,
        )?;

        // Step 5: Pre-projection operations
        let rows = operations::apply_pre_projection(
            rows,
            &query.operations,
            &schema,
            self.config.max_page_size,
        )?;
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        // Steps 6-7: Sort, then group or project. Reverse flips every key.
        let reversed = operations::reverses_order(&query.operations)?;
        let orient = |keys: Vec<SortKey>| -> Vec<SortKey> {
            if reversed {
                keys.iter().map(SortKey::reversed).collect()
            } else {
                keys
            }
        };
        let (rows, keys) = match binding {
            None => {
                let grouped = grouping::aggregate(rows, query, &schema)?;
                let keys = orient(grouped.sort_keys);
                let mut rows = grouped.rows;
                ResultSorter::sort(&mut rows, &keys);
                let shaped: Vec<ShapedRow> = rows.into_iter().map(ShapedRow::grouped).collect();
                (shaped, keys)
            }
            Some(binding) => {
                let keys = orient(source_sort_keys(query, binding, &schema, self.storage)?);
                let mut rows = rows;
                ResultSorter::sort(&mut rows, &keys);
                let shaped: Vec<ShapedRow> = rows
                    .into_iter()
                    .map(|source| ShapedRow {
                        shaped: binding.project(&source),
                        source,
                    })
                    .collect();
                (shaped, keys)
            }
        };

        // Step 8: Post-projection operations
        let rows =
            operations::apply_post_projection_by(rows, &query.operations, |row| &row.shaped)?;

        // Step 9: Paging over source key values
        let size = self
            .config
            .effective_page_size(query.page.as_ref().and_then(|p| p.size));
        let cursor = query.page.as_ref().and_then(|p| p.cursor.as_deref());
        let page = Pager::new(&keys, size)
            .with_metrics(self.metrics)
            .apply_keyed(rows, cursor, schema.name(), |row| &row.source);

        let total_count = if query.wants_count() {
            self.total_count(&schema, &predicate, cancel)
        } else {
            None
        };

        // Step 10: Narrow and materialize
        let items = page
            .records
            .into_iter()
            .map(|row| match binding {
                Some(binding) => binding.narrow(row.shaped, &query.select),
                None => row.shaped,
            })
            .map(|record| serde_json::from_value::<T>(Value::Object(record)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(QueryError::Materialization)?;

        Ok(QueryResponse {
            items,
            page: PageInfo {
                size,
                next_cursor: page.next_cursor,
                total_count,
            },
            meta: ResponseMeta {
                from_cache: false,
                rows_examined,
            },
        })
    }

    /// Best-effort count of filtered rows; failures are logged, not raised
    fn total_count(
        &self,
        schema: &EntitySchema,
        predicate: &Predicate,
        cancel: &CancellationToken,
    ) -> Option<u64> {
        match self.storage.count(schema.name(), predicate, cancel) {
            Ok(count) => Some(count),
            Err(err) => {
                let message = err.to_string();
                log_event(
                    Event::CountFailed,
                    &[
                        ("code", err.code()),
                        ("entity", schema.name()),
                        ("error", message.as_str()),
                    ],
                );
                if let Some(metrics) = self.metrics {
                    metrics.increment_count_failures();
                }
                None
            }
        }
    }
}

/// A row before and after shaping; sorting and paging read `source`
struct ShapedRow {
    source: Record,
    shaped: Record,
}

impl ShapedRow {
    /// Group rows are keyed and returned as-is
    fn grouped(row: Record) -> Self {
        Self {
            source: row.clone(),
            shaped: row,
        }
    }
}

/// Requested sort keys over entity fields, then the identity, then the
/// identity of each inner-joined entity.
///
/// Keys name source fields, so cursors carry source names whatever the
/// target members are called.
fn source_sort_keys(
    query: &AbstractQuery,
    binding: &ProjectionBinding,
    schema: &EntitySchema,
    storage: &dyn StorageProvider,
) -> QueryResult<Vec<SortKey>> {
    let mut keys = Vec::with_capacity(query.sort.len() + 1 + query.joins.len());
    for spec in &query.sort {
        let direction = SortDirection::parse(&spec.direction).ok_or_else(|| {
            QueryError::InvalidOperation(format!("unknown sort direction '{}'", spec.direction))
        })?;
        if binding.target_of(&spec.field).is_none() {
            return Err(QueryError::SortFieldNotProjected(spec.field.clone()));
        }
        keys.push(SortKey::new(spec.field.clone(), direction).typed(schema.field_type(&spec.field)));
    }

    let identity = schema.identity();
    if binding.target_of(identity).is_none() {
        return Err(QueryError::SortFieldNotProjected(identity.to_string()));
    }
    if !keys.iter().any(|k| k.field == identity) {
        keys.push(SortKey::asc(identity).typed(schema.field_type(identity)));
    }

    // One root row fans out to many joined rows
    for join in &query.joins {
        if JoinKind::parse(&join.kind) != Some(JoinKind::Join) {
            continue;
        }
        let joined = storage
            .schema(&join.entity)
            .ok_or_else(|| QueryError::UnknownEntity(join.entity.clone()))?;
        let member = joined_identity(&joined);
        if !keys.iter().any(|k| k.field == member) {
            keys.push(SortKey::asc(member).typed(joined.field_type(joined.identity())));
        }
    }
    Ok(keys)
}
