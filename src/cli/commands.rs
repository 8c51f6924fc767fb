//! CLI command implementations
//!
//! Each command loads the policy file first. Nothing here reaches storage
//! without going through `QueryEngine`.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::engine::QueryEngine;
use crate::observability::{log_event, AuditLog, Event, FileAuditLog, MemoryAuditLog};
use crate::policy::{EntityConfiguration, ValidationConfig};
use crate::projection::{ProjectionBinding, ProjectionRegistry};
use crate::schema::EntitySchema;
use crate::storage::{MemoryStorage, StorageError, StorageProvider};
use crate::validation::QueryValidator;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_query, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::CheckConfig { config, data } => check_config(&config, data.as_deref()),
        Command::Validate { config } => validate(&config),
        Command::Run {
            config,
            data,
            audit_log,
        } => run_query(&config, &data, audit_log.as_deref()),
    }
}

/// Load a policy file and print what it whitelists
///
/// With a data file, also checks every whitelisted field and configured
/// projection against the stored schemas.
pub fn check_config(config_path: &Path, data_path: Option<&Path>) -> CliResult<()> {
    let config = load_policy(config_path)?;

    if let Some(data_path) = data_path {
        let storage = MemoryStorage::load(data_path)?;
        let registry = projection_registry(&config, &storage)?;
        QueryEngine::new(Arc::new(config.clone()), Arc::new(storage), Arc::new(registry))?;
    }

    write_response(config_summary(&config))
}

/// Validate a query from stdin and print the result
pub fn validate(config_path: &Path) -> CliResult<()> {
    let config = load_policy(config_path)?;
    let query = read_query()?;

    let result = QueryValidator::new(Arc::new(config)).validate(&query);
    write_response(serde_json::to_value(&result)?)
}

/// Execute a query from stdin against a data file
pub fn run_query(config_path: &Path, data_path: &Path, audit_path: Option<&Path>) -> CliResult<()> {
    let config = load_policy(config_path)?;
    let storage = MemoryStorage::load(data_path)?;
    let registry = projection_registry(&config, &storage)?;

    let audit: Arc<dyn AuditLog> = match audit_path {
        Some(path) => Arc::new(FileAuditLog::open(path)?),
        None => Arc::new(MemoryAuditLog::new()),
    };
    let engine = QueryEngine::new(Arc::new(config), Arc::new(storage), Arc::new(registry))?
        .with_audit_log(audit);

    let query = read_query()?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Io(format!("Failed to create tokio runtime: {}", e)))?;
    let response = rt.block_on(engine.execute_with_timeout::<Value>(query))?;

    write_response(serde_json::to_value(&response)?)
}

/// Builds JSON projections for every configured entity
///
/// Entities listed under `projections` bind exactly the configured
/// `target -> source` pairs. A source naming another entity, or containing
/// a '.', is a joined member. Other configured entities bind their
/// selectable fields plus the identity under their own names.
pub fn projection_registry(
    config: &ValidationConfig,
    storage: &dyn StorageProvider,
) -> CliResult<ProjectionRegistry> {
    let mut registry = ProjectionRegistry::new();

    for (entity, members) in config.projections() {
        let schema = storage
            .schema(entity)
            .ok_or_else(|| CliError::UnknownProjectionEntity(entity.clone()))?;

        let binding = members
            .iter()
            .fold(ProjectionBinding::new(), |binding, (target, source)| {
                if is_joined_source(config, source) {
                    binding.bind_joined(target.as_str(), source.as_str())
                } else {
                    binding.bind(target.as_str(), source.as_str())
                }
            });
        registry.register::<Value>(&schema, binding)?;
    }

    for entity in config.entities() {
        if config.projection(&entity.name).is_some() {
            continue;
        }
        let schema = storage
            .schema(&entity.name)
            .ok_or_else(|| StorageError::UnknownEntity(entity.name.clone()))?;
        registry.register::<Value>(&schema, default_binding(entity, &schema))?;
    }

    Ok(registry)
}

fn is_joined_source(config: &ValidationConfig, source: &str) -> bool {
    source.contains('.') || config.entity(source).is_some()
}

fn default_binding(entity: &EntityConfiguration, schema: &EntitySchema) -> ProjectionBinding {
    let mut fields: Vec<&str> = entity
        .selectable_fields
        .iter()
        .map(String::as_str)
        .filter(|field| schema.has_field(field))
        .collect();
    if !fields.contains(&schema.identity()) {
        fields.insert(0, schema.identity());
    }
    ProjectionBinding::identity_of(fields)
}

fn load_policy(path: &Path) -> CliResult<ValidationConfig> {
    let config = ValidationConfig::load(path)?;

    let entities = config.entities().count().to_string();
    let path_str = path.display().to_string();
    log_event(
        Event::ConfigLoaded,
        &[("entities", entities.as_str()), ("path", path_str.as_str())],
    );
    Ok(config)
}

fn config_summary(config: &ValidationConfig) -> Value {
    let mut configured: Vec<&EntityConfiguration> = config.entities().collect();
    configured.sort_by_key(|entity| entity.key());

    let entities: Vec<Value> = configured
        .into_iter()
        .map(|entity| {
            json!({
                "name": entity.name,
                "filterable": entity.filterable_fields,
                "sortable": entity.sortable_fields,
                "selectable": entity.selectable_fields,
                "projected": config.projection(&entity.name).is_some(),
            })
        })
        .collect();

    json!({
        "maxDepth": config.max_depth,
        "maxNodes": config.max_nodes,
        "maxPageSize": config.max_page_size,
        "defaultPageSize": config.default_page_size,
        "executionTimeoutSeconds": config.execution_timeout.as_secs(),
        "entities": entities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DATA: &str = r#"{
        "entities": [
            {
                "name": "User",
                "fields": {
                    "Id": {"type": "int"},
                    "Name": {"type": "string"},
                    "PasswordHash": {"type": "string"}
                },
                "records": [{"Id": 1, "Name": "Ada", "PasswordHash": "h"}]
            },
            {
                "name": "Order",
                "fields": {"Id": {"type": "int"}, "UserId": {"type": "int"}, "Total": {"type": "float"}},
                "records": []
            }
        ]
    }"#;

    fn policy() -> ValidationConfig {
        ValidationConfig::from_json(
            r#"{
                "entities": [
                    {"name": "User", "filterableFields": ["Id"], "selectableFields": ["Name"]},
                    {"name": "Order", "filterableFields": ["UserId"], "selectableFields": ["Total"]}
                ],
                "projections": {
                    "User": {"UserId": "Id", "DisplayName": "Name", "Orders": "Order"}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_configured_projection_marks_joined_members() {
        let storage = MemoryStorage::from_json(DATA).unwrap();
        let registry = projection_registry(&policy(), &storage).unwrap();

        let user = registry.get::<Value>("user").unwrap();
        assert_eq!(user.source_of("DisplayName"), Some("Name"));
        assert_eq!(user.target_of("Id"), Some("UserId"));
        let orders = user.members().iter().find(|m| m.target == "Orders").unwrap();
        assert!(orders.joined);
    }

    #[test]
    fn test_default_projection_binds_identity() {
        let storage = MemoryStorage::from_json(DATA).unwrap();
        let registry = projection_registry(&policy(), &storage).unwrap();

        let order = registry.get::<Value>("Order").unwrap();
        assert_eq!(order.source_of("Id"), Some("Id"));
        assert_eq!(order.source_of("Total"), Some("Total"));
        assert_eq!(order.members().len(), 2);
    }

    #[test]
    fn test_projection_for_entity_missing_from_storage() {
        let config = ValidationConfig::from_json(
            r#"{"entities": [{"name": "Invoice"}], "projections": {"Invoice": {"Id": "Id"}}}"#,
        )
        .unwrap();
        let storage = MemoryStorage::from_json(DATA).unwrap();
        let err = projection_registry(&config, &storage).unwrap_err();
        assert_eq!(err.code(), "AERO_CLI_UNKNOWN_PROJECTION_ENTITY");
    }

    #[test]
    fn test_summary_lists_whitelists() {
        let summary = config_summary(&policy());
        assert_eq!(summary["maxPageSize"], 200);
        assert_eq!(summary["entities"][0]["name"], "Order");
        assert_eq!(summary["entities"][1]["filterable"], json!(["Id"]));
        assert_eq!(summary["entities"][1]["projected"], true);
    }

    #[test]
    fn test_check_config_with_data_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("policy.json");
        let data_path = dir.path().join("data.json");
        fs::write(
            &config_path,
            r#"{"entities": [{"name": "User", "filterableFields": ["Email"]}]}"#,
        )
        .unwrap();
        fs::write(&data_path, DATA).unwrap();

        let err = check_config(&config_path, Some(&data_path)).unwrap_err();
        assert_eq!(err.code(), "AERO_ENGINE_POLICY_FIELD");
    }
}
