//! Adapter that bridges the storage layer to the ListUsers engine.
//!
//! The domain crate reads tuples through its `TupleReader` trait; the storage
//! crate implements `DataStore`. `DataStoreTupleReader` connects the two.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::trace;

use fgalist_domain::error::{DomainError, DomainResult};
use fgalist_domain::listusers::{ReadFilter, ReadOptions, TupleReader, TupleStream};
use fgalist_domain::model::{Object, RelationshipCondition, TupleKey};
use fgalist_storage::{DataStore, StorageError, StoredTuple, TupleFilter};

/// Implements `TupleReader` over a `DataStore`.
pub struct DataStoreTupleReader<S: DataStore> {
    storage: Arc<S>,
}

impl<S: DataStore> DataStoreTupleReader<S> {
    /// Creates a new adapter wrapping the given storage.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

fn storage_error(e: StorageError) -> DomainError {
    DomainError::Storage {
        message: e.to_string(),
    }
}

/// Converts a stored tuple to the domain's tuple key.
pub fn to_tuple_key(tuple: StoredTuple) -> TupleKey {
    let object = tuple.object();
    let user = tuple.user();
    TupleKey {
        object,
        relation: tuple.relation,
        user,
        condition: tuple.condition_name.map(|name| RelationshipCondition {
            name,
            context: tuple.condition_context.unwrap_or_else(HashMap::new),
        }),
    }
}

#[async_trait]
impl<S: DataStore> TupleReader for DataStoreTupleReader<S> {
    async fn read(
        &self,
        store_id: &str,
        filter: &ReadFilter,
        options: &ReadOptions,
    ) -> DomainResult<TupleStream> {
        let object =
            Object::parse(&filter.object).map_err(|e| DomainError::InvalidObjectFormat {
                value: format!("{}: {}", filter.object, e),
            })?;
        // The memory store is always consistent; the preference is only traced.
        trace!(consistency = ?options.consistency, filter = ?filter, "reading tuples");

        let tuples = self
            .storage
            .read_tuples(
                store_id,
                &TupleFilter::for_object(object.object_type, object.object_id, &filter.relation),
            )
            .await
            .map_err(storage_error)?;

        Ok(stream::iter(tuples.into_iter().map(|t| Ok(to_tuple_key(t)))).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgalist_storage::MemoryDataStore;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_reads_tuples_on_object_and_relation() {
        let storage = MemoryDataStore::new_shared();
        storage.create_store("store", "Test").await.unwrap();
        storage
            .write_tuples(
                "store",
                vec![
                    StoredTuple::new("document", "1", "viewer", "user", "alice", None),
                    StoredTuple::new("document", "1", "viewer", "group", "eng", Some("member".to_string()))
                        .with_condition("in_region", None),
                    StoredTuple::new("document", "2", "viewer", "user", "bob", None),
                ],
                vec![],
            )
            .await
            .unwrap();

        let reader = DataStoreTupleReader::new(storage);
        let mut tuples: Vec<TupleKey> = reader
            .read(
                "store",
                &ReadFilter::new("document:1", "viewer"),
                &ReadOptions::default(),
            )
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        tuples.sort_by(|a, b| a.user.cmp(&b.user));

        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].user, "group:eng#member");
        assert_eq!(
            tuples[0].condition.as_ref().map(|c| c.name.as_str()),
            Some("in_region")
        );
        assert_eq!(tuples[1].to_string(), "document:1#viewer@user:alice");
    }

    #[tokio::test]
    async fn test_missing_store_is_a_storage_error() {
        let reader = DataStoreTupleReader::new(MemoryDataStore::new_shared());
        let result = reader
            .read(
                "missing",
                &ReadFilter::new("document:1", "viewer"),
                &ReadOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(DomainError::Storage { .. })));
    }
}
