//! Request and response types for ListUsers.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{TupleKey, User};

/// Request for listing the users that hold a relation on an object.
#[derive(Debug, Clone)]
pub struct ListUsersRequest {
    /// The store ID to query.
    pub store_id: String,
    /// The object to list users for (type:id format).
    pub object: String,
    /// The relation to resolve (e.g., "viewer").
    pub relation: String,
    /// Subject types to return; the first one also names the wildcard type.
    pub user_filters: Vec<UserFilter>,
    /// Tuples considered in addition to storage, for this request only.
    pub contextual_tuples: Arc<Vec<TupleKey>>,
    /// CEL evaluation context variables.
    pub context: Arc<HashMap<String, serde_json::Value>>,
    pub consistency: ConsistencyPreference,
    /// Per-request throttling threshold, capped by the configured maximum.
    pub dispatch_throttling_threshold: Option<u32>,
}

impl ListUsersRequest {
    /// Creates a new ListUsersRequest without contextual tuples or context.
    pub fn new(
        store_id: impl Into<String>,
        object: impl Into<String>,
        relation: impl Into<String>,
        user_filters: Vec<UserFilter>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            object: object.into(),
            relation: relation.into(),
            user_filters,
            contextual_tuples: Arc::new(Vec::new()),
            context: Arc::new(HashMap::new()),
            consistency: ConsistencyPreference::default(),
            dispatch_throttling_threshold: None,
        }
    }

    pub fn with_contextual_tuples(mut self, tuples: Vec<TupleKey>) -> Self {
        self.contextual_tuples = Arc::new(tuples);
        self
    }

    pub fn with_context(mut self, context: HashMap<String, serde_json::Value>) -> Self {
        self.context = Arc::new(context);
        self
    }

    pub fn with_consistency(mut self, consistency: ConsistencyPreference) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_dispatch_throttling_threshold(mut self, threshold: u32) -> Self {
        self.dispatch_throttling_threshold = Some(threshold);
        self
    }
}

/// Filter for user types in ListUsers requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilter {
    /// The type to filter for (e.g., "user", "group").
    pub type_name: String,
    /// Relation for userset filters (e.g., "member" for "group#member").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

impl UserFilter {
    /// Creates a new UserFilter for a direct type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: None,
        }
    }

    /// Creates a new UserFilter for a userset type (e.g., group#member).
    pub fn with_relation(type_name: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: Some(relation.into()),
        }
    }

    /// Parses `type` or `type#relation`.
    pub fn parse(value: &str) -> Result<Self, &'static str> {
        match value.split_once('#') {
            Some((type_name, relation)) if !type_name.is_empty() && !relation.is_empty() => {
                Ok(Self::with_relation(type_name, relation))
            }
            Some(_) => Err("user filter must be 'type' or 'type#relation'"),
            None if value.is_empty() || value.contains(':') => {
                Err("user filter must be 'type' or 'type#relation'")
            }
            None => Ok(Self::new(value)),
        }
    }
}

/// Read consistency requested by the caller, passed through to storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyPreference {
    #[default]
    Unspecified,
    MinimizeLatency,
    HigherConsistency,
}

/// Whether a found user holds the relation.
///
/// `NoRelationship` only travels between set operations so that an
/// enclosing exclusion can subtract correctly. It never reaches a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RelationshipStatus {
    #[default]
    HasRelationship,
    NoRelationship,
}

/// A subject produced by expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundUser {
    pub user: User,
    /// Subjects carved out of a wildcard by an exclusion.
    pub excluded_users: Vec<User>,
    pub status: RelationshipStatus,
}

impl FoundUser {
    /// A user that holds the relation.
    pub fn has(user: User) -> Self {
        Self {
            user,
            excluded_users: Vec::new(),
            status: RelationshipStatus::HasRelationship,
        }
    }

    /// A user explicitly removed by an exclusion.
    pub fn no(user: User) -> Self {
        Self {
            user,
            excluded_users: Vec::new(),
            status: RelationshipStatus::NoRelationship,
        }
    }

    pub fn with_status(mut self, status: RelationshipStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_excluded(mut self, excluded_users: Vec<User>) -> Self {
        self.excluded_users = excluded_users;
        self
    }

    pub fn has_relationship(&self) -> bool {
        self.status == RelationshipStatus::HasRelationship
    }

    /// The dedup key.
    pub fn key(&self) -> String {
        self.user.to_string()
    }
}

/// Result of a ListUsers query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListUsersResponse {
    /// Users holding the relation, sorted by key.
    pub users: Vec<User>,
    /// Users removed from a returned wildcard.
    pub excluded_users: Vec<User>,
    /// Whether the deadline or the result cap cut the expansion short.
    pub truncated: bool,
    pub metadata: ListUsersMetadata,
}

/// Counters describing the work a query did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListUsersMetadata {
    pub datastore_query_count: u64,
    pub datastore_item_count: u64,
    pub dispatch_count: u32,
    pub was_throttled: bool,
}
