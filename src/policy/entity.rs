//! Per-entity whitelist

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::query::FilterOperator;

/// Static whitelist of what a client may touch on one entity.
///
/// Created once at startup and never mutated afterwards. Field names are
/// matched exactly (case-sensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfiguration {
    /// Display name, e.g. `User`
    pub name: String,
    #[serde(default)]
    pub filterable_fields: BTreeSet<String>,
    #[serde(default)]
    pub sortable_fields: BTreeSet<String>,
    #[serde(default)]
    pub selectable_fields: BTreeSet<String>,
    /// Optional per-field restriction of the global operator set
    #[serde(default)]
    pub field_operators: BTreeMap<String, BTreeSet<FilterOperator>>,
}

impl EntityConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Lookup key used by the policy map
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn filterable<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.filterable_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn sortable<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.sortable_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn selectable<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.selectable_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Restricts `field` to the given operators
    pub fn operators(
        mut self,
        field: impl Into<String>,
        operators: impl IntoIterator<Item = FilterOperator>,
    ) -> Self {
        self.field_operators
            .entry(field.into())
            .or_default()
            .extend(operators);
        self
    }

    pub fn is_filterable(&self, field: &str) -> bool {
        self.filterable_fields.contains(field)
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable_fields.contains(field)
    }

    pub fn is_selectable(&self, field: &str) -> bool {
        self.selectable_fields.contains(field)
    }

    /// True unless the field has a restricted operator set excluding `op`
    pub fn allows_operator(&self, field: &str, op: FilterOperator) -> bool {
        self.field_operators
            .get(field)
            .map(|allowed| allowed.contains(&op))
            .unwrap_or(true)
    }

    /// Every field name this configuration mentions
    pub fn referenced_fields(&self) -> BTreeSet<&str> {
        self.filterable_fields
            .iter()
            .chain(&self.sortable_fields)
            .chain(&self.selectable_fields)
            .chain(self.field_operators.keys())
            .map(String::as_str)
            .collect()
    }
}
