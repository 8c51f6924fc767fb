//! Member-to-member projection binding
//!
//! A binding lists target members and the source field each is read from.
//! Projection builds a fresh row holding only the bound members; any
//! source field not named in the binding is never copied.

use serde_json::Value;

use crate::schema::Record;

use super::errors::{ProjectionError, ProjectionResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingMember {
    pub target: String,
    pub source: String,
    /// Read from a join-attached member rather than an entity field
    pub joined: bool,
}

/// Ordered target <- source mapping for one (entity, target type) pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionBinding {
    members: Vec<BindingMember>,
}

impl ProjectionBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds target member `target` to entity field `source`
    pub fn bind(self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.push(target.into(), source.into(), false)
    }

    /// Binds a member added by a join (`Order.Total`, or a groupjoin array)
    pub fn bind_joined(self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.push(target.into(), source.into(), true)
    }

    /// Same-name bindings for each field
    pub fn identity_of<S: AsRef<str>>(fields: impl IntoIterator<Item = S>) -> Self {
        fields
            .into_iter()
            .fold(Self::new(), |b, f| b.bind(f.as_ref(), f.as_ref()))
    }

    fn push(mut self, target: String, source: String, joined: bool) -> Self {
        self.members.push(BindingMember {
            target,
            source,
            joined,
        });
        self
    }

    pub fn members(&self) -> &[BindingMember] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Target member bound to `source`, first binding wins
    pub fn target_of(&self, source: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.source == source)
            .map(|m| m.target.as_str())
    }

    pub fn source_of(&self, target: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.target == target)
            .map(|m| m.source.as_str())
    }

    pub(crate) fn check_targets(&self) -> ProjectionResult<()> {
        for (i, member) in self.members.iter().enumerate() {
            if self.members[..i].iter().any(|m| m.target == member.target) {
                return Err(ProjectionError::DuplicateTarget(member.target.clone()));
            }
        }
        Ok(())
    }

    /// Builds the projected row
    pub fn project(&self, record: &Record) -> Record {
        self.members
            .iter()
            .map(|m| {
                let value = record.get(&m.source).cloned().unwrap_or(Value::Null);
                (m.target.clone(), value)
            })
            .collect()
    }

    /// Keeps only members whose source field is listed in `select`.
    /// Join-attached members are kept; the join's own `select` chose them.
    pub fn narrow(&self, mut projected: Record, select: &[String]) -> Record {
        if select.is_empty() {
            return projected;
        }
        projected.retain(|target, _| {
            self.members
                .iter()
                .find(|m| m.target == *target)
                .map(|m| m.joined || select.iter().any(|s| *s == m.source))
                .unwrap_or(false)
        });
        projected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn binding() -> ProjectionBinding {
        ProjectionBinding::new()
            .bind("id", "Id")
            .bind("displayName", "Name")
            .bind_joined("orderTotal", "Order.Total")
    }

    #[test]
    fn test_project_copies_only_bound_members() {
        let record = json!({"Id": 1, "Name": "Ada", "PasswordHash": "x", "Order.Total": 5.0})
            .as_object()
            .cloned()
            .unwrap();
        let projected = binding().project(&record);
        assert_eq!(
            serde_json::Value::Object(projected),
            json!({"id": 1, "displayName": "Ada", "orderTotal": 5.0})
        );
    }

    #[test]
    fn test_lookup_both_ways() {
        let b = binding();
        assert_eq!(b.target_of("Name"), Some("displayName"));
        assert_eq!(b.source_of("id"), Some("Id"));
        assert_eq!(b.target_of("PasswordHash"), None);
    }

    #[test]
    fn test_narrow_by_source_select() {
        let b = binding();
        let projected = b.project(&json!({"Id": 1, "Name": "Ada"}).as_object().cloned().unwrap());
        let narrowed = b.narrow(projected.clone(), &["Name".to_string()]);
        assert_eq!(narrowed.len(), 2);
        assert!(narrowed.contains_key("displayName"));
        assert!(narrowed.contains_key("orderTotal"));
        assert!(!narrowed.contains_key("id"));
        assert_eq!(b.narrow(projected, &[]).len(), 3);
    }

    #[test]
    fn test_duplicate_target() {
        let b = ProjectionBinding::new().bind("id", "Id").bind("id", "Name");
        assert_eq!(b.check_targets(), Err(ProjectionError::DuplicateTarget("id".into())));
        assert!(ProjectionBinding::identity_of(["Id", "Name"]).check_targets().is_ok());
    }
}
