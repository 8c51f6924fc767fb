//! Projection registry
//!
//! Bindings are registered once per (entity, target type) at startup and
//! looked up by the translator. A missing binding is a translation error,
//! never a fallback to raw records.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use crate::observability::{log_event, Event};
use crate::schema::EntitySchema;

use super::binding::ProjectionBinding;
use super::errors::{ProjectionError, ProjectionResult};

#[derive(Debug)]
struct Registered {
    binding: ProjectionBinding,
    target: &'static str,
}

#[derive(Debug, Default)]
pub struct ProjectionRegistry {
    bindings: HashMap<(String, TypeId), Registered>,
}

impl ProjectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `binding` as the projection from `schema` to `T`
    ///
    /// Every non-joined source must be a declared field, and the identity
    /// field must be bound so results stay pageable.
    pub fn register<T: 'static>(
        &mut self,
        schema: &EntitySchema,
        binding: ProjectionBinding,
    ) -> ProjectionResult<()> {
        let target = type_name::<T>();
        let entity = schema.name().to_string();

        if binding.is_empty() {
            return Err(ProjectionError::EmptyBinding {
                entity,
                target: target.to_string(),
            });
        }
        binding.check_targets()?;
        if let Some(member) = binding
            .members()
            .iter()
            .find(|m| !m.joined && !schema.has_field(&m.source))
        {
            return Err(ProjectionError::UnknownSourceField {
                entity,
                field: member.source.clone(),
            });
        }
        if binding.target_of(schema.identity()).is_none() {
            return Err(ProjectionError::IdentityNotProjected {
                entity,
                target: target.to_string(),
                identity: schema.identity().to_string(),
            });
        }

        let key = (schema.key(), TypeId::of::<T>());
        if self.bindings.contains_key(&key) {
            return Err(ProjectionError::AlreadyRegistered {
                entity,
                target: target.to_string(),
            });
        }

        let members = binding.members().len().to_string();
        self.bindings.insert(key, Registered { binding, target });
        log_event(
            Event::ProjectionRegistered,
            &[
                ("entity", entity.as_str()),
                ("members", members.as_str()),
                ("target", target),
            ],
        );
        Ok(())
    }

    /// Binding from `entity` (case-insensitive) to `T`
    pub fn get<T: 'static>(&self, entity: &str) -> Option<&ProjectionBinding> {
        self.bindings
            .get(&(entity.to_lowercase(), TypeId::of::<T>()))
            .map(|r| &r.binding)
    }

    /// Registered (entity key, target type name) pairs, sorted
    pub fn registrations(&self) -> Vec<(String, &'static str)> {
        let mut pairs: Vec<_> = self
            .bindings
            .iter()
            .map(|((entity, _), r)| (entity.clone(), r.target))
            .collect();
        pairs.sort();
        pairs
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
