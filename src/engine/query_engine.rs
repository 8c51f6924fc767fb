//! Query engine entry points
//!
//! `validate` and `execute` are the two calls the surrounding application
//! makes. `execute` validates first; a rejected query is logged, counted and
//! audited as blocked and never reaches storage.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::observability::{
    log_event, AuditAction, AuditLog, AuditOutcome, AuditRecord, Event, MemoryAuditLog,
    MetricsRegistry, Timer,
};
use crate::policy::ValidationConfig;
use crate::projection::ProjectionRegistry;
use crate::query::{AbstractQuery, QueryResponse};
use crate::storage::StorageProvider;
use crate::translator::QueryTranslator;
use crate::validation::{QueryValidator, ValidationResult};

use super::errors::{EngineError, EngineResult};

fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

/// Validates, executes and observes queries over one storage provider
#[derive(Clone)]
pub struct QueryEngine {
    validator: QueryValidator,
    config: Arc<ValidationConfig>,
    storage: Arc<dyn StorageProvider>,
    projections: Arc<ProjectionRegistry>,
    metrics: Arc<MetricsRegistry>,
    audit: Arc<dyn AuditLog>,
}

impl QueryEngine {
    /// Builds an engine, rejecting policies that name undeclared fields
    pub fn new(
        config: Arc<ValidationConfig>,
        storage: Arc<dyn StorageProvider>,
        projections: Arc<ProjectionRegistry>,
    ) -> EngineResult<Self> {
        check_policy(&config, storage.as_ref())?;
        Ok(Self {
            validator: QueryValidator::new(Arc::clone(&config)),
            config,
            storage,
            projections,
            metrics: Arc::new(MetricsRegistry::new()),
            audit: Arc::new(MemoryAuditLog::new()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Validates without executing
    pub fn validate(&self, query: &AbstractQuery) -> ValidationResult {
        let result = self.validator.validate(query);
        let errors = result.errors().len().to_string();
        log_event(
            Event::QueryValidated,
            &[("entity", query.entity.as_str()), ("errors", errors.as_str())],
        );
        result
    }

    /// Validates then executes `query`, producing one page of `T`
    pub fn execute<T: DeserializeOwned + 'static>(
        &self,
        query: AbstractQuery,
        cancel: &CancellationToken,
    ) -> EngineResult<QueryResponse<T>> {
        let timer = Timer::new();
        let entity = query.entity.clone();
        log_event(Event::QueryReceived, &[("entity", entity.as_str())]);

        let validated = match self.validator.accept(query) {
            Ok(validated) => validated,
            Err(result) => return Err(self.block(&entity, result)),
        };
        self.metrics.increment_validated();

        let translator = QueryTranslator::new(self.storage.as_ref(), &self.projections, &self.config)
            .with_metrics(&self.metrics);

        match translator.execute::<T>(&validated, cancel) {
            Ok(response) => {
                let elapsed = timer.elapsed();
                let rows = response.len() as u64;
                self.metrics
                    .record_executed(response.meta.rows_examined, rows, elapsed);

                let rows_str = rows.to_string();
                let examined = response.meta.rows_examined.to_string();
                let elapsed_us = micros(elapsed).to_string();
                log_event(
                    Event::QueryExecuted,
                    &[
                        ("elapsed_us", elapsed_us.as_str()),
                        ("entity", entity.as_str()),
                        ("rows", rows_str.as_str()),
                        ("rows_examined", examined.as_str()),
                    ],
                );
                self.audit(
                    AuditRecord::new(AuditAction::QueryExecuted, AuditOutcome::Success)
                        .with_entity(entity)
                        .with_rows_returned(rows)
                        .with_elapsed_us(micros(elapsed)),
                );
                Ok(response)
            }
            Err(err) => {
                let elapsed = timer.elapsed();
                self.metrics.record_failed(elapsed);

                let message = err.to_string();
                log_event(
                    Event::QueryFailed,
                    &[
                        ("code", err.code()),
                        ("entity", entity.as_str()),
                        ("error", message.as_str()),
                    ],
                );
                self.audit(
                    AuditRecord::new(AuditAction::QueryFailed, AuditOutcome::Failed)
                        .with_entity(entity)
                        .with_error(err.code(), message)
                        .with_elapsed_us(micros(elapsed)),
                );
                Err(err.into())
            }
        }
    }

    /// Runs `execute` on the blocking pool under the configured timeout
    ///
    /// On expiry the storage call is cancelled and `Timeout` is returned.
    pub async fn execute_with_timeout<T>(&self, query: AbstractQuery) -> EngineResult<QueryResponse<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let timeout = self.config.execution_timeout;
        let entity = query.entity.clone();
        let cancel = CancellationToken::new();

        let engine = self.clone();
        let token = cancel.clone();
        let task = tokio::task::spawn_blocking(move || engine.execute::<T>(query, &token));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(EngineError::Task(join_err.to_string())),
            Err(_) => {
                cancel.cancel();
                self.metrics.increment_timed_out();

                let timeout_ms = timeout.as_millis().to_string();
                log_event(
                    Event::QueryTimeout,
                    &[("entity", entity.as_str()), ("timeout_ms", timeout_ms.as_str())],
                );
                let err = EngineError::Timeout(timeout);
                self.audit(
                    AuditRecord::new(AuditAction::QueryFailed, AuditOutcome::Failed)
                        .with_entity(entity)
                        .with_error(err.code(), err.to_string()),
                );
                Err(err)
            }
        }
    }

    fn block(&self, entity: &str, result: ValidationResult) -> EngineError {
        let security_event = result.has_guardrail_violation();
        self.metrics.record_blocked(security_event);

        let summary = result.summary();
        log_event(
            Event::QueryBlocked,
            &[
                ("entity", entity),
                ("reason", summary.as_str()),
                ("security_event", if security_event { "true" } else { "false" }),
            ],
        );
        self.audit(
            AuditRecord::new(AuditAction::QueryBlocked, AuditOutcome::Rejected)
                .with_entity(entity)
                .with_reasons(result.messages())
                .with_security_event(security_event),
        );
        EngineError::Rejected(result)
    }

    fn audit(&self, record: AuditRecord) {
        if let Err(err) = self.audit.append(&record) {
            let message = err.to_string();
            let id = record.id.to_string();
            log_event(
                Event::AuditWriteFailed,
                &[("action", record.action.as_str()), ("error", message.as_str()), ("id", id.as_str())],
            );
        }
    }
}

/// Every whitelisted field must exist in the storage schema.
/// `collection.member` names resolve through the collection's element fields.
fn check_policy(config: &ValidationConfig, storage: &dyn StorageProvider) -> EngineResult<()> {
    for entity in config.entities() {
        let schema = storage
            .schema(&entity.name)
            .ok_or_else(|| EngineError::PolicyEntity(entity.name.clone()))?;

        for field in entity.referenced_fields() {
            let declared = match field.split_once('.') {
                Some((collection, member)) => schema
                    .field_type(collection)
                    .and_then(|t| t.member_fields())
                    .map(|members| members.contains_key(member))
                    .unwrap_or(false),
                None => schema.has_field(field),
            };
            if !declared {
                return Err(EngineError::PolicyField {
                    entity: entity.name.clone(),
                    field: field.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::EntityConfiguration;
    use crate::projection::ProjectionBinding;
    use crate::query::QueryBuilder;
    use crate::schema::{EntitySchema, FieldType};
    use crate::storage::{MemoryStorage, ScanOutput, StorageError, StorageResult};
    use crate::translator::Predicate;
    use serde_json::{json, Value};
    use std::time::Instant;

    const DATA: &str = r#"{
        "entities": [{
            "name": "User",
            "fields": {
                "Id": {"type": "int"},
                "Name": {"type": "string"},
                "PasswordHash": {"type": "string"},
                "Orders": {"type": "array", "element_type": {"type": "object", "fields": {"Total": {"type": "float"}}}}
            },
            "records": [
                {"Id": 1, "Name": "Ada", "PasswordHash": "h1"},
                {"Id": 2, "Name": "Linus", "PasswordHash": "h2"}
            ]
        }]
    }"#;

    fn policy() -> ValidationConfig {
        ValidationConfig::new().with_entity(
            EntityConfiguration::new("User")
                .filterable(["Id", "Name", "Orders", "Orders.Total"])
                .sortable(["Id", "Name"])
                .selectable(["Id", "Name"]),
        )
    }

    fn engine_over(storage: Arc<dyn StorageProvider>, config: ValidationConfig) -> (QueryEngine, Arc<MemoryAuditLog>) {
        let schema = storage.schema("User").unwrap();
        let mut registry = ProjectionRegistry::new();
        registry
            .register::<Value>(&schema, ProjectionBinding::identity_of(["Id", "Name"]))
            .unwrap();
        let audit = Arc::new(MemoryAuditLog::new());
        let engine = QueryEngine::new(Arc::new(config), storage, Arc::new(registry))
            .unwrap()
            .with_audit_log(audit.clone());
        (engine, audit)
    }

    fn engine() -> (QueryEngine, Arc<MemoryAuditLog>) {
        engine_over(Arc::new(MemoryStorage::from_json(DATA).unwrap()), policy())
    }

    #[test]
    fn test_execute_audits_success() {
        let (engine, audit) = engine();
        let query = QueryBuilder::for_entity("user").order_by("Name").build().unwrap();
        let response = engine
            .execute::<Value>(query, &CancellationToken::new())
            .unwrap();

        assert_eq!(response.items[0], json!({"Id": 1, "Name": "Ada"}));
        assert_eq!(engine.metrics().snapshot().queries_executed, 1);
        let records = audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::QueryExecuted);
        assert_eq!(records[0].rows_returned, Some(2));
    }

    #[test]
    fn test_blocked_query_never_reaches_storage() {
        let (engine, audit) = engine();
        let query = QueryBuilder::for_entity("User")
            .equals("PasswordHash", "h1")
            .build()
            .unwrap();
        let err = engine
            .execute::<Value>(query, &CancellationToken::new())
            .unwrap_err();

        assert_eq!(err.code(), "AERO_ENGINE_REJECTED");
        assert!(err.to_string().contains("PasswordHash"));
        let snapshot = engine.metrics().snapshot();
        assert_eq!(snapshot.queries_blocked, 1);
        assert_eq!(snapshot.guardrail_violations, 1);
        assert_eq!(snapshot.rows_examined, 0);

        let records = audit.records();
        assert_eq!(records[0].action, AuditAction::QueryBlocked);
        assert!(records[0].security_event);
    }

    #[test]
    fn test_translation_failure_is_audited() {
        let (engine, audit) = engine();
        // Projection registered for Value only
        let query = QueryBuilder::for_entity("User").build().unwrap();
        let err = engine
            .execute::<serde_json::Map<String, Value>>(query, &CancellationToken::new())
            .unwrap_err();
        assert_eq!(err.code(), "AERO_QUERY_MISSING_PROJECTION");
        assert_eq!(engine.metrics().snapshot().queries_failed, 1);
        assert_eq!(
            audit.records()[0].error_code.as_deref(),
            Some("AERO_QUERY_MISSING_PROJECTION")
        );
    }

    #[test]
    fn test_policy_cross_check() {
        let storage: Arc<dyn StorageProvider> = Arc::new(MemoryStorage::from_json(DATA).unwrap());
        let bad_field = ValidationConfig::new()
            .with_entity(EntityConfiguration::new("User").filterable(["Email"]));
        let err = QueryEngine::new(Arc::new(bad_field), storage.clone(), Arc::default())
            .err()
            .unwrap();
        assert_eq!(err.code(), "AERO_ENGINE_POLICY_FIELD");

        let bad_member = ValidationConfig::new()
            .with_entity(EntityConfiguration::new("User").filterable(["Orders.Cost"]));
        assert!(QueryEngine::new(Arc::new(bad_member), storage.clone(), Arc::default()).is_err());

        let bad_entity =
            ValidationConfig::new().with_entity(EntityConfiguration::new("Invoice"));
        let err = QueryEngine::new(Arc::new(bad_entity), storage, Arc::default())
            .err()
            .unwrap();
        assert_eq!(err.code(), "AERO_ENGINE_POLICY_ENTITY");
    }

    /// Scan that only returns once cancelled
    struct StalledStorage {
        schema: EntitySchema,
    }

    impl StorageProvider for StalledStorage {
        fn schema(&self, _: &str) -> Option<EntitySchema> {
            Some(self.schema.clone())
        }

        fn entities(&self) -> Vec<String> {
            vec![self.schema.name().to_string()]
        }

        fn scan(
            &self,
            _: &str,
            _: &Predicate,
            cancel: &CancellationToken,
        ) -> StorageResult<ScanOutput> {
            let started = Instant::now();
            while started.elapsed() < Duration::from_secs(5) {
                if cancel.is_cancelled() {
                    return Err(StorageError::Cancelled);
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(ScanOutput::default())
        }
    }

    #[tokio::test]
    async fn test_execute_with_timeout_cancels_storage() {
        let schema = EntitySchema::new("User")
            .with_field("Id", FieldType::Int)
            .with_field("Name", FieldType::String);
        let config = ValidationConfig::new()
            .with_entity(
                EntityConfiguration::new("User")
                    .filterable(["Id"])
                    .selectable(["Id", "Name"]),
            )
            .with_execution_timeout(Duration::from_millis(50));
        let (engine, audit) = engine_over(Arc::new(StalledStorage { schema }), config);

        let query = QueryBuilder::for_entity("User").build().unwrap();
        let started = Instant::now();
        let err = engine.execute_with_timeout::<Value>(query).await.unwrap_err();

        assert!(matches!(err, EngineError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(engine.metrics().snapshot().queries_timed_out, 1);
        assert!(audit
            .records()
            .iter()
            .any(|r| r.error_code.as_deref() == Some("AERO_ENGINE_TIMEOUT")));
    }

    #[tokio::test]
    async fn test_execute_with_timeout_returns_page() {
        let (engine, _) = engine();
        let query = QueryBuilder::for_entity("User").page_size(1).build().unwrap();
        let response = engine.execute_with_timeout::<Value>(query).await.unwrap();
        assert_eq!(response.len(), 1);
        assert!(response.has_more());
    }
}
