//! Per-request view of tuple storage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;

use crate::error::{DomainError, DomainResult};
use crate::model::TupleKey;

use super::traits::{ReadFilter, ReadOptions, TupleReader, TupleStream};

/// Wraps the datastore for a single query.
///
/// Contextual tuples that match a read come first, followed by stored
/// tuples. Reads hold one of `max_concurrent_reads` permits while the
/// underlying read is issued. Stored reads and items are counted for the
/// response metadata.
pub struct RequestTupleReader {
    inner: Arc<dyn TupleReader>,
    contextual_tuples: Arc<Vec<TupleKey>>,
    read_permits: Arc<Semaphore>,
    query_count: AtomicU64,
    item_count: Arc<AtomicU64>,
}

impl RequestTupleReader {
    pub fn new(
        inner: Arc<dyn TupleReader>,
        contextual_tuples: Arc<Vec<TupleKey>>,
        max_concurrent_reads: u32,
    ) -> Self {
        let permits = usize::try_from(max_concurrent_reads)
            .unwrap_or(usize::MAX)
            .clamp(1, Semaphore::MAX_PERMITS);
        Self {
            inner,
            contextual_tuples,
            read_permits: Arc::new(Semaphore::new(permits)),
            query_count: AtomicU64::new(0),
            item_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Reads issued against the datastore.
    pub fn datastore_query_count(&self) -> u64 {
        self.query_count.load(Ordering::Relaxed)
    }

    /// Stored tuples yielded so far.
    pub fn datastore_item_count(&self) -> u64 {
        self.item_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TupleReader for RequestTupleReader {
    async fn read(
        &self,
        store_id: &str,
        filter: &ReadFilter,
        options: &ReadOptions,
    ) -> DomainResult<TupleStream> {
        let contextual: Vec<DomainResult<TupleKey>> = self
            .contextual_tuples
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .map(Ok)
            .collect();

        let stored = {
            let _permit = Arc::clone(&self.read_permits)
                .acquire_owned()
                .await
                .map_err(|_| DomainError::Storage {
                    message: "read limiter closed".to_string(),
                })?;
            self.query_count.fetch_add(1, Ordering::Relaxed);
            self.inner.read(store_id, filter, options).await?
        };

        let item_count = Arc::clone(&self.item_count);
        let stored = stored.inspect(move |item| {
            if item.is_ok() {
                item_count.fetch_add(1, Ordering::Relaxed);
            }
        });

        Ok(stream::iter(contextual).chain(stored).boxed())
    }
}
