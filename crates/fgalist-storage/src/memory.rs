//! In-memory storage implementation.
//!
//! Tuples are keyed by identity, so writes and deletes are O(1) and
//! repeated writes of the same tuple are idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    parse_user_filter, validate_store_id, validate_tuple, DataStore, Store, StoredTuple,
    TupleFilter, TupleKey,
};

/// In-memory implementation of DataStore.
///
/// # Performance Characteristics
///
/// - **Write tuple**: O(1) average
/// - **Delete tuple**: O(1) average
/// - **Read tuples**: O(N) where N is total tuples in store
/// - **Store operations**: O(1) (DashMap lookup)
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    stores: DashMap<String, Store>,
    tuples: DashMap<String, HashMap<TupleKey, StoredTuple>>,
}

impl MemoryDataStore {
    /// Creates a new in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory data store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn ensure_store(&self, store_id: &str) -> StorageResult<()> {
        if self.stores.contains_key(store_id) {
            Ok(())
        } else {
            Err(StorageError::StoreNotFound {
                store_id: store_id.to_string(),
            })
        }
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store> {
        validate_store_id(id)?;

        let now = chrono::Utc::now();
        let store = Store {
            id: id.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        match self.stores.entry(id.to_string()) {
            Entry::Occupied(_) => {
                return Err(StorageError::StoreAlreadyExists {
                    store_id: id.to_string(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(store.clone());
            }
        }
        self.tuples.entry(id.to_string()).or_default();

        debug!(store_id = %id, "created store");
        Ok(store)
    }

    async fn get_store(&self, id: &str) -> StorageResult<Store> {
        self.stores
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| StorageError::StoreNotFound {
                store_id: id.to_string(),
            })
    }

    async fn delete_store(&self, id: &str) -> StorageResult<()> {
        if self.stores.remove(id).is_none() {
            return Err(StorageError::StoreNotFound {
                store_id: id.to_string(),
            });
        }
        self.tuples.remove(id);
        Ok(())
    }

    async fn list_stores(&self) -> StorageResult<Vec<Store>> {
        let mut stores: Vec<Store> = self.stores.iter().map(|s| s.value().clone()).collect();
        stores.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stores)
    }

    #[instrument(skip(self, writes, deletes), fields(writes = writes.len(), deletes = deletes.len()))]
    async fn write_tuples(
        &self,
        store_id: &str,
        writes: Vec<StoredTuple>,
        deletes: Vec<StoredTuple>,
    ) -> StorageResult<()> {
        validate_store_id(store_id)?;
        for tuple in writes.iter().chain(&deletes) {
            validate_tuple(tuple)?;
        }
        self.ensure_store(store_id)?;

        let mut tuples = self.tuples.entry(store_id.to_string()).or_default();

        // Check every write before applying any, so a conflict leaves the
        // store untouched.
        for tuple in &writes {
            let key = tuple.key();
            if deletes.iter().any(|d| d.key() == key) {
                continue;
            }
            if let Some(existing) = tuples.get(&key) {
                if existing.condition_name != tuple.condition_name {
                    return Err(StorageError::ConditionConflict {
                        tuple: tuple.to_string(),
                        existing: existing.condition_name.clone(),
                        requested: tuple.condition_name.clone(),
                    });
                }
            }
        }

        for tuple in deletes {
            tuples.remove(&tuple.key());
        }
        for tuple in writes {
            tuples.insert(tuple.key(), tuple);
        }

        Ok(())
    }

    async fn read_tuples(
        &self,
        store_id: &str,
        filter: &TupleFilter,
    ) -> StorageResult<Vec<StoredTuple>> {
        self.ensure_store(store_id)?;

        let user_filter = filter.user.as_deref().map(parse_user_filter).transpose()?;

        let filtered = self
            .tuples
            .get(store_id)
            .map(|tuples| {
                tuples
                    .values()
                    .filter(|t| {
                        filter
                            .object_type
                            .as_ref()
                            .map_or(true, |ot| &t.object_type == ot)
                            && filter
                                .object_id
                                .as_ref()
                                .map_or(true, |oi| &t.object_id == oi)
                            && filter.relation.as_ref().map_or(true, |r| &t.relation == r)
                            && user_filter.as_ref().map_or(true, |(ut, ui, ur)| {
                                &t.user_type == ut && &t.user_id == ui && &t.user_relation == ur
                            })
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(filtered)
    }
}
