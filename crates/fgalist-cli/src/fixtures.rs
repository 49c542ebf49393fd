//! Model and tuple fixtures.
//!
//! A fixture is a JSON document holding an authorization model and the
//! tuples to load into a store:
//!
//! ```json
//! {
//!   "model": { "schema_version": "1.1", "type_definitions": [...] },
//!   "tuples": [{ "object": "document:1", "relation": "viewer", "user": "user:alice" }]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use fgalist_domain::model::{AuthorizationModel, Object, TupleKey, User, WILDCARD_ID};
use fgalist_storage::{DataStore, StorageError, StoredTuple};

/// Errors raised while loading a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid tuple '{tuple}': {reason}")]
    InvalidTuple { tuple: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// An authorization model plus its tuples.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub model: AuthorizationModel,
    #[serde(default)]
    pub tuples: Vec<TupleKey>,
}

impl Fixture {
    /// Reads a fixture from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Creates `store_id` if needed and writes every tuple into it.
    pub async fn load_into<S: DataStore>(
        &self,
        storage: &S,
        store_id: &str,
    ) -> Result<(), FixtureError> {
        match storage.create_store(store_id, store_id).await {
            Ok(_) | Err(StorageError::StoreAlreadyExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let tuples = self
            .tuples
            .iter()
            .map(to_stored_tuple)
            .collect::<Result<Vec<_>, _>>()?;
        let count = tuples.len();
        storage.write_tuples(store_id, tuples, Vec::new()).await?;

        info!(store_id, tuples = count, "loaded fixture tuples");
        Ok(())
    }
}

fn to_stored_tuple(tuple: &TupleKey) -> Result<StoredTuple, FixtureError> {
    let invalid = |reason: &str| FixtureError::InvalidTuple {
        tuple: tuple.to_string(),
        reason: reason.to_string(),
    };
    let object = Object::parse(&tuple.object).map_err(invalid)?;
    let (user_type, user_id, user_relation) = match User::parse(&tuple.user).map_err(invalid)? {
        User::Object { user_type, user_id } => (user_type, user_id, None),
        User::Userset {
            userset_type,
            userset_id,
            relation,
        } => (userset_type, userset_id, Some(relation)),
        User::Wildcard { wildcard_type } => (wildcard_type, WILDCARD_ID.to_string(), None),
    };

    let stored = StoredTuple::new(
        object.object_type,
        object.object_id,
        tuple.relation.as_str(),
        user_type,
        user_id,
        user_relation,
    );
    Ok(match &tuple.condition {
        Some(condition) => {
            stored.with_condition(condition.name.as_str(), Some(condition.context.clone()))
        }
        None => stored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgalist_storage::{MemoryDataStore, TupleFilter};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FIXTURE: &str = r#"{
        "model": {
            "schema_version": "1.1",
            "type_definitions": [
                { "type_name": "user" },
                {
                    "type_name": "document",
                    "relations": [
                        {
                            "name": "viewer",
                            "type_constraints": [{ "type_name": "user" }, { "type_name": "user:*" }],
                            "rewrite": "this"
                        }
                    ]
                }
            ]
        },
        "tuples": [
            { "object": "document:1", "relation": "viewer", "user": "user:alice" },
            { "object": "document:1", "relation": "viewer", "user": "user:*" },
            {
                "object": "document:1",
                "relation": "viewer",
                "user": "user:bob",
                "condition": { "name": "in_region", "context": { "region": "eu" } }
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_fixture_loads_into_memory_store() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{FIXTURE}").unwrap();

        let fixture = Fixture::from_path(file.path()).unwrap();
        assert_eq!(fixture.model.type_definitions.len(), 2);

        let storage = MemoryDataStore::new();
        fixture.load_into(&storage, "fixture").await.unwrap();
        // Loading twice reuses the store and rewrites the same tuples.
        fixture.load_into(&storage, "fixture").await.unwrap();

        let tuples = storage
            .read_tuples("fixture", &TupleFilter::default())
            .await
            .unwrap();
        assert_eq!(tuples.len(), 3);
        assert!(tuples.iter().any(|t| t.user_id == "*"));
        assert!(tuples
            .iter()
            .any(|t| t.condition_name.as_deref() == Some("in_region")));
    }

    #[test]
    fn test_malformed_tuple_is_rejected() {
        let tuple = TupleKey::new("document", "viewer", "user:alice");
        assert!(matches!(
            to_stored_tuple(&tuple),
            Err(FixtureError::InvalidTuple { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            Fixture::from_path("/nonexistent/fixture.json"),
            Err(FixtureError::Io { .. })
        ));
    }
}
