//! DataStore trait definition.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Maximum length of a store ID.
const MAX_STORE_ID_LEN: usize = 64;

/// Filter for reading tuples. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct TupleFilter {
    /// Filter by object type.
    pub object_type: Option<String>,
    /// Filter by object ID.
    pub object_id: Option<String>,
    /// Filter by relation.
    pub relation: Option<String>,
    /// Filter by user ("type:id" or "type:id#relation").
    pub user: Option<String>,
}

impl TupleFilter {
    /// Matches every tuple on `object_type:object_id#relation`.
    pub fn for_object(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            object_type: Some(object_type.into()),
            object_id: Some(object_id.into()),
            relation: Some(relation.into()),
            user: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// A stored tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTuple {
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
    pub user_type: String,
    pub user_id: String,
    pub user_relation: Option<String>,
    pub condition_name: Option<String>,
    pub condition_context: Option<HashMap<String, serde_json::Value>>,
}

impl StoredTuple {
    /// Creates an unconditioned tuple.
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        relation: impl Into<String>,
        user_type: impl Into<String>,
        user_id: impl Into<String>,
        user_relation: Option<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
            relation: relation.into(),
            user_type: user_type.into(),
            user_id: user_id.into(),
            user_relation,
            condition_name: None,
            condition_context: None,
        }
    }

    /// Attaches a condition and its stored context.
    pub fn with_condition(
        mut self,
        name: impl Into<String>,
        context: Option<HashMap<String, serde_json::Value>>,
    ) -> Self {
        self.condition_name = Some(name.into());
        self.condition_context = context;
        self
    }

    /// The object as "type:id".
    pub fn object(&self) -> String {
        format!("{}:{}", self.object_type, self.object_id)
    }

    /// The user as "type:id" or "type:id#relation".
    pub fn user(&self) -> String {
        match &self.user_relation {
            Some(relation) => format!("{}:{}#{}", self.user_type, self.user_id, relation),
            None => format!("{}:{}", self.user_type, self.user_id),
        }
    }

    /// Identity of the tuple, ignoring its condition.
    pub(crate) fn key(&self) -> TupleKey {
        TupleKey {
            object_type: self.object_type.clone(),
            object_id: self.object_id.clone(),
            relation: self.relation.clone(),
            user_type: self.user_type.clone(),
            user_id: self.user_id.clone(),
            user_relation: self.user_relation.clone(),
        }
    }
}

impl fmt::Display for StoredTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object(), self.relation, self.user())
    }
}

/// Identity of a stored tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct TupleKey {
    pub(crate) object_type: String,
    pub(crate) object_id: String,
    pub(crate) relation: String,
    pub(crate) user_type: String,
    pub(crate) user_id: String,
    pub(crate) user_relation: Option<String>,
}

/// Store metadata.
#[derive(Debug, Clone)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Abstract storage interface for authorization data.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    // Store operations

    /// Creates a new store.
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store>;

    /// Gets a store by ID.
    async fn get_store(&self, id: &str) -> StorageResult<Store>;

    /// Deletes a store and its tuples.
    async fn delete_store(&self, id: &str) -> StorageResult<()>;

    /// Lists all stores.
    async fn list_stores(&self) -> StorageResult<Vec<Store>>;

    // Tuple operations

    /// Writes tuples to storage (insert and delete). Deletes apply first.
    async fn write_tuples(
        &self,
        store_id: &str,
        writes: Vec<StoredTuple>,
        deletes: Vec<StoredTuple>,
    ) -> StorageResult<()>;

    /// Writes a single tuple.
    async fn write_tuple(&self, store_id: &str, tuple: StoredTuple) -> StorageResult<()> {
        self.write_tuples(store_id, vec![tuple], vec![]).await
    }

    /// Reads tuples matching the filter.
    async fn read_tuples(
        &self,
        store_id: &str,
        filter: &TupleFilter,
    ) -> StorageResult<Vec<StoredTuple>>;
}

fn invalid(message: impl Into<String>) -> StorageError {
    StorageError::InvalidInput {
        message: message.into(),
    }
}

/// Validates a store ID: non-empty, bounded, alphanumeric plus `-` and `_`.
pub fn validate_store_id(id: &str) -> StorageResult<()> {
    if id.is_empty() {
        return Err(invalid("store id cannot be empty"));
    }
    if id.len() > MAX_STORE_ID_LEN {
        return Err(invalid(format!(
            "store id exceeds {MAX_STORE_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(format!("store id '{id}' contains invalid characters")));
    }
    Ok(())
}

/// Validates the fields of a tuple before it is written.
pub fn validate_tuple(tuple: &StoredTuple) -> StorageResult<()> {
    let required = [
        ("object_type", &tuple.object_type),
        ("object_id", &tuple.object_id),
        ("relation", &tuple.relation),
        ("user_type", &tuple.user_type),
        ("user_id", &tuple.user_id),
    ];
    for (field, value) in required {
        if value.is_empty() {
            return Err(invalid(format!("{field} cannot be empty")));
        }
        if value.contains(['#', '@']) || (field != "user_id" && value.contains(':')) {
            return Err(invalid(format!("{field} '{value}' contains invalid characters")));
        }
    }
    if tuple.user_relation.as_deref() == Some("") {
        return Err(invalid("user_relation cannot be empty when set"));
    }
    if tuple.condition_name.as_deref() == Some("") {
        return Err(invalid("condition_name cannot be empty when set"));
    }
    Ok(())
}

/// Splits a user filter into (type, id, relation).
pub(crate) fn parse_user_filter(user: &str) -> StorageResult<(String, String, Option<String>)> {
    let (subject, relation) = match user.split_once('#') {
        Some((subject, relation)) => (subject, Some(relation.to_string())),
        None => (user, None),
    };
    let (user_type, user_id) = subject
        .split_once(':')
        .filter(|(t, id)| !t.is_empty() && !id.is_empty())
        .ok_or_else(|| invalid(format!("user filter '{user}' must be 'type:id'")))?;
    Ok((user_type.to_string(), user_id.to_string(), relation))
}
