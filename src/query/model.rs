//! Abstract query model
//!
//! The serializable, backend-agnostic description of a query as it travels
//! over the wire (camelCase JSON). It carries no behavior: it is built or
//! deserialized, validated, translated and discarded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A complete query request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractQuery {
    /// Target entity name (case-insensitive)
    #[serde(default)]
    pub entity: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterCondition>,

    /// Sort keys in precedence order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortSpecification>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageRequest>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<QueryOperation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupBySpecification>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<AggregationSpecification>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinSpecification>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<QueryHints>,
}

impl AbstractQuery {
    /// Creates an empty query for an entity
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    /// Parses a query from its JSON wire form
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serializes the query to its JSON wire form
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// True when the query takes the grouped execution path
    pub fn is_grouped(&self) -> bool {
        self.group_by
            .as_ref()
            .map(|g| !g.fields.is_empty())
            .unwrap_or(false)
    }

    /// True when the caller asked for a total count
    pub fn wants_count(&self) -> bool {
        self.hints.as_ref().map(|h| h.include_count).unwrap_or(false)
    }
}

/// A node of the recursive filter tree
///
/// On the wire both variants share one object shape
/// (`{field, operator, value, conditions, logic}`); an object carrying
/// `conditions` is a group, anything else is a leaf. An object carrying
/// both leaf members and `conditions` is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireCondition", into = "WireCondition")]
pub enum FilterCondition {
    Leaf(FilterLeaf),
    Group(FilterGroup),
}

/// `{field, operator, value}`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterLeaf {
    pub field: String,
    /// Raw operator symbol; validated against the supported set
    pub operator: String,
    /// `None` covers both an absent and a JSON-null value
    pub value: Option<Value>,
}

/// `{conditions, logic}`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterGroup {
    pub conditions: Vec<FilterCondition>,
    /// Raw logic symbol, `and` when absent
    pub logic: Option<String>,
}

impl FilterCondition {
    /// Creates a leaf condition
    pub fn leaf(field: impl Into<String>, operator: impl Into<String>, value: Option<Value>) -> Self {
        FilterCondition::Leaf(FilterLeaf {
            field: field.into(),
            operator: operator.into(),
            value,
        })
    }

    /// Creates an AND group
    pub fn all(conditions: Vec<FilterCondition>) -> Self {
        FilterCondition::Group(FilterGroup {
            conditions,
            logic: Some("and".to_string()),
        })
    }

    /// Creates an OR group
    pub fn any(conditions: Vec<FilterCondition>) -> Self {
        FilterCondition::Group(FilterGroup {
            conditions,
            logic: Some("or".to_string()),
        })
    }

    /// Depth of this subtree; a leaf has depth 1
    pub fn depth(&self) -> usize {
        match self {
            FilterCondition::Leaf(_) => 1,
            FilterCondition::Group(group) => {
                1 + group.conditions.iter().map(|c| c.depth()).max().unwrap_or(0)
            }
        }
    }

    /// Number of nodes (leaves and groups) in this subtree
    pub fn node_count(&self) -> usize {
        match self {
            FilterCondition::Leaf(_) => 1,
            FilterCondition::Group(group) => {
                1 + group.conditions.iter().map(|c| c.node_count()).sum::<usize>()
            }
        }
    }
}

/// Flat wire shape shared by leaves and groups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCondition {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    field: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conditions: Option<Vec<FilterCondition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logic: Option<String>,
}

impl TryFrom<WireCondition> for FilterCondition {
    type Error = String;

    fn try_from(wire: WireCondition) -> Result<Self, Self::Error> {
        let has_leaf_members =
            !wire.field.is_empty() || !wire.operator.is_empty() || wire.value.is_some();
        match wire.conditions {
            Some(_) if has_leaf_members => Err(format!(
                "filter node '{}' carries both a condition and nested conditions",
                wire.field
            )),
            Some(conditions) => Ok(FilterCondition::Group(FilterGroup {
                conditions,
                logic: wire.logic,
            })),
            None => Ok(FilterCondition::Leaf(FilterLeaf {
                field: wire.field,
                operator: wire.operator,
                value: wire.value.filter(|v| !v.is_null()),
            })),
        }
    }
}

impl From<FilterCondition> for WireCondition {
    fn from(condition: FilterCondition) -> Self {
        match condition {
            FilterCondition::Leaf(leaf) => WireCondition {
                field: leaf.field,
                operator: leaf.operator,
                value: leaf.value,
                ..WireCondition::default()
            },
            FilterCondition::Group(group) => WireCondition {
                conditions: Some(group.conditions),
                logic: group.logic,
                ..WireCondition::default()
            },
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpecification {
    pub field: String,
    #[serde(default = "default_direction")]
    pub direction: String,
}

fn default_direction() -> String {
    "asc".to_string()
}

impl SortSpecification {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: "asc".to_string(),
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: "desc".to_string(),
        }
    }
}

/// Page request; `size` falls back to the configured default when absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// A sequence operation with its operation-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOperation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl QueryOperation {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name).filter(|v| !v.is_null())
    }

    pub fn string_parameter(&self, name: &str) -> Option<&str> {
        self.parameter(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBySpecification {
    #[serde(default)]
    pub fields: Vec<String>,
    /// Evaluated after aggregation, over group fields and aliases
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub having: Vec<FilterCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSpecification {
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl AggregationSpecification {
    /// Output column name: the alias, or `count` / `<function>_<field>`
    pub fn output_name(&self) -> String {
        if let Some(alias) = self.alias.as_deref().filter(|a| !a.trim().is_empty()) {
            return alias.to_string();
        }
        let function = self.function.trim().to_ascii_lowercase();
        match self.field.as_deref().filter(|f| !f.is_empty()) {
            Some(field) => format!("{}_{}", function, field),
            None => function,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpecification {
    #[serde(rename = "type", default = "default_join_kind")]
    pub kind: String,
    #[serde(default)]
    pub entity: String,
    /// source field -> target field
    #[serde(default)]
    pub on: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<String>,
}

fn default_join_kind() -> String {
    "join".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHints {
    #[serde(default)]
    pub include_count: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_seconds: Option<u64>,
}
