//! Validation policy: global limits plus the entity whitelist map
//!
//! Built once at process start, either in code or from a JSON file, and
//! shared read-only (`Arc<ValidationConfig>`) by every request afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::entity::EntityConfiguration;
use super::errors::{PolicyError, PolicyResult};

pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_MAX_NODES: usize = 50;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 200;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 30;

/// The security policy every query is validated against
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Maximum filter tree depth (a top-level leaf has depth 1)
    pub max_depth: usize,
    /// Maximum number of filter nodes, counted across the whole tree
    pub max_nodes: usize,
    pub max_page_size: u32,
    /// Page size used when a request does not specify one
    pub default_page_size: u32,
    /// Declared deadline; enforced by the caller, not by translation
    pub execution_timeout: Duration,
    entities: HashMap<String, EntityConfiguration>,
    projections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            default_page_size: DEFAULT_PAGE_SIZE,
            execution_timeout: Duration::from_secs(DEFAULT_EXECUTION_TIMEOUT_SECS),
            entities: HashMap::new(),
            projections: BTreeMap::new(),
        }
    }
}

impl ValidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an entity whitelist
    pub fn with_entity(mut self, entity: EntityConfiguration) -> Self {
        self.entities.insert(entity.key(), entity);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn with_default_page_size(mut self, default_page_size: u32) -> Self {
        self.default_page_size = default_page_size;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Case-insensitive entity lookup
    pub fn entity(&self, name: &str) -> Option<&EntityConfiguration> {
        self.entities.get(&name.trim().to_lowercase())
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityConfiguration> {
        self.entities.values()
    }

    /// Declared projection members (`target -> source`) for an entity, if any
    pub fn projection(&self, entity: &str) -> Option<&BTreeMap<String, String>> {
        self.projections.get(&entity.trim().to_lowercase())
    }

    pub fn projections(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, String>)> {
        self.projections.iter()
    }

    /// Clamps a requested page size into `[1, max_page_size]`
    pub fn effective_page_size(&self, requested: Option<i64>) -> u32 {
        let requested = requested.unwrap_or(i64::from(self.default_page_size));
        let clamped = requested.clamp(1, i64::from(self.max_page_size.max(1)));
        u32::try_from(clamped).unwrap_or(self.max_page_size)
    }

    /// Checks the global limits
    pub fn check_limits(&self) -> PolicyResult<()> {
        if self.max_depth == 0 {
            return Err(PolicyError::InvalidLimit("maxDepth must be > 0".into()));
        }
        if self.max_nodes == 0 {
            return Err(PolicyError::InvalidLimit("maxNodes must be > 0".into()));
        }
        if self.max_page_size == 0 {
            return Err(PolicyError::InvalidLimit("maxPageSize must be > 0".into()));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(PolicyError::InvalidLimit(format!(
                "defaultPageSize must be between 1 and {}, got {}",
                self.max_page_size, self.default_page_size
            )));
        }
        if self.execution_timeout.is_zero() {
            return Err(PolicyError::InvalidLimit(
                "executionTimeoutSeconds must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Loads a policy file
    pub fn load(path: &Path) -> PolicyResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and checks a policy document
    pub fn from_json(json: &str) -> PolicyResult<Self> {
        let file: PolicyFile = serde_json::from_str(json)?;
        Self::try_from(file)
    }
}

/// On-disk policy format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyFile {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub execution_timeout_seconds: u64,
    #[serde(default)]
    pub entities: Vec<EntityConfiguration>,
    /// entity -> (target member -> source field)
    #[serde(default)]
    pub projections: BTreeMap<String, BTreeMap<String, String>>,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}
fn default_max_nodes() -> usize {
    DEFAULT_MAX_NODES
}
fn default_max_page_size() -> u32 {
    DEFAULT_MAX_PAGE_SIZE
}
fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}
fn default_timeout_secs() -> u64 {
    DEFAULT_EXECUTION_TIMEOUT_SECS
}

impl TryFrom<PolicyFile> for ValidationConfig {
    type Error = PolicyError;

    fn try_from(file: PolicyFile) -> PolicyResult<Self> {
        let mut config = ValidationConfig {
            max_depth: file.max_depth,
            max_nodes: file.max_nodes,
            max_page_size: file.max_page_size,
            default_page_size: file.default_page_size,
            execution_timeout: Duration::from_secs(file.execution_timeout_seconds),
            entities: HashMap::new(),
            projections: BTreeMap::new(),
        };
        config.check_limits()?;

        for entity in file.entities {
            if entity.name.trim().is_empty() {
                return Err(PolicyError::EmptyEntityName);
            }
            let key = entity.key();
            if config.entities.contains_key(&key) {
                return Err(PolicyError::DuplicateEntity(entity.name));
            }
            config.entities.insert(key, entity);
        }

        for (entity, members) in file.projections {
            let key = entity.trim().to_lowercase();
            if !config.entities.contains_key(&key) {
                return Err(PolicyError::UnknownProjectionEntity(entity));
            }
            config.projections.insert(key, members);
        }

        Ok(config)
    }
}
