//! Type system for authorization model lookups with caching.
//!
//! The `TypeSystem` provides efficient lookups for types and relations
//! with internal caching using `DashMap` for thread-safe concurrent access.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{DomainError, DomainResult};

use super::types::{AuthorizationModel, Condition, RelationDefinition, TypeDefinition, User};

/// Type system providing cached access to authorization model types and relations.
///
/// Shared across every task of a ListUsers query, so lookups go through
/// `DashMap` caches rather than a lock around the model.
#[derive(Debug)]
pub struct TypeSystem {
    model: Arc<AuthorizationModel>,
    /// Keyed by type name.
    type_cache: DashMap<String, Arc<TypeDefinition>>,
    /// Keyed by "type_name#relation".
    relation_cache: DashMap<String, Arc<RelationDefinition>>,
}

impl TypeSystem {
    /// Creates a new `TypeSystem` from an authorization model.
    pub fn new(model: AuthorizationModel) -> Self {
        Self {
            model: Arc::new(model),
            type_cache: DashMap::new(),
            relation_cache: DashMap::new(),
        }
    }

    /// Returns a reference to the underlying authorization model.
    pub fn model(&self) -> &AuthorizationModel {
        &self.model
    }

    /// Gets a type definition by name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TypeNotFound` if the type does not exist in the model.
    pub fn get_type(&self, type_name: &str) -> DomainResult<Arc<TypeDefinition>> {
        if let Some(cached) = self.type_cache.get(type_name) {
            return Ok(Arc::clone(cached.value()));
        }

        let type_def = self
            .model
            .type_definitions
            .iter()
            .find(|td| td.type_name == type_name)
            .ok_or_else(|| DomainError::TypeNotFound {
                type_name: type_name.to_string(),
            })?;

        let type_def = Arc::new(type_def.clone());
        self.type_cache
            .insert(type_name.to_string(), Arc::clone(&type_def));
        Ok(type_def)
    }

    /// Gets a relation definition for a specific type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TypeNotFound` if the type does not exist and
    /// `DomainError::RelationNotFound` if the relation is not defined on it.
    /// Expansion treats the latter as an empty branch.
    pub fn get_relation(
        &self,
        type_name: &str,
        relation: &str,
    ) -> DomainResult<Arc<RelationDefinition>> {
        let cache_key = format!("{type_name}#{relation}");
        if let Some(cached) = self.relation_cache.get(&cache_key) {
            return Ok(Arc::clone(cached.value()));
        }

        let type_def = self.get_type(type_name)?;
        let relation_def = type_def
            .relations
            .iter()
            .find(|r| r.name == relation)
            .ok_or_else(|| DomainError::RelationNotFound {
                type_name: type_name.to_string(),
                relation: relation.to_string(),
            })?;

        let relation_def = Arc::new(relation_def.clone());
        self.relation_cache
            .insert(cache_key, Arc::clone(&relation_def));
        Ok(relation_def)
    }

    /// Checks if a type exists in the model.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.get_type(type_name).is_ok()
    }

    /// Checks if a relation exists on a type.
    pub fn has_relation(&self, type_name: &str, relation: &str) -> bool {
        self.get_relation(type_name, relation).is_ok()
    }

    /// Finds a condition definition by name.
    pub fn find_condition(&self, name: &str) -> Option<&Condition> {
        self.model.find_condition(name)
    }

    /// Whether a tuple `object_type#relation@user` fits the model.
    ///
    /// A relation without type constraints accepts any subject. Unknown
    /// types or relations make the tuple invalid.
    pub fn is_tuple_valid(&self, object_type: &str, relation: &str, user: &User) -> bool {
        let Ok(relation_def) = self.get_relation(object_type, relation) else {
            return false;
        };
        relation_def.type_constraints.is_empty()
            || relation_def
                .type_constraints
                .iter()
                .any(|constraint| constraint.allows(user))
    }

    /// Clears the lookup caches.
    pub fn clear_cache(&self) {
        self.type_cache.clear();
        self.relation_cache.clear();
    }

    /// Number of cached type definitions.
    pub fn type_cache_size(&self) -> usize {
        self.type_cache.len()
    }

    /// Number of cached relation definitions.
    pub fn relation_cache_size(&self) -> usize {
        self.relation_cache.len()
    }
}
