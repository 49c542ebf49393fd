//! Mock implementations for ListUsers testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{DomainError, DomainResult};
use crate::listusers::{ReadFilter, ReadOptions, Throttler, TupleReader, TupleStream};
use crate::model::TupleKey;

/// Mock tuple reader for testing.
pub struct MockTupleReader {
    tuples: RwLock<HashMap<String, Vec<TupleKey>>>,
    failing: RwLock<HashSet<String>>,
    panicking: RwLock<HashSet<String>>,
    delay: RwLock<Option<Duration>>,
    reads: Mutex<Vec<ReadOptions>>,
}

fn key(store_id: &str, object: &str, relation: &str) -> String {
    format!("{store_id}/{object}#{relation}")
}

impl MockTupleReader {
    pub fn new() -> Self {
        Self {
            tuples: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            panicking: RwLock::new(HashSet::new()),
            delay: RwLock::new(None),
            reads: Mutex::new(Vec::new()),
        }
    }

    pub async fn add_tuple(&self, store_id: &str, tuple: TupleKey) {
        self.tuples
            .write()
            .await
            .entry(key(store_id, &tuple.object, &tuple.relation))
            .or_default()
            .push(tuple);
    }

    /// Adds `object#relation@user` tuples to "store".
    pub async fn add_tuples(&self, tuples: &[(&str, &str, &str)]) {
        for (object, relation, user) in tuples {
            self.add_tuple("store", TupleKey::new(*object, *relation, *user))
                .await;
        }
    }

    /// Reads of `object#relation` in any store fail.
    pub async fn fail_reads_on(&self, object: &str, relation: &str) {
        self.failing
            .write()
            .await
            .insert(format!("{object}#{relation}"));
    }

    /// Reads of `object#relation` in any store panic.
    pub async fn panic_on(&self, object: &str, relation: &str) {
        self.panicking
            .write()
            .await
            .insert(format!("{object}#{relation}"));
    }

    /// Every read sleeps this long before answering.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Options of every read so far.
    pub fn recorded_options(&self) -> Vec<ReadOptions> {
        self.reads.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TupleReader for MockTupleReader {
    async fn read(
        &self,
        store_id: &str,
        filter: &ReadFilter,
        options: &ReadOptions,
    ) -> DomainResult<TupleStream> {
        if let Ok(mut reads) = self.reads.lock() {
            reads.push(*options);
        }

        let node = format!("{}#{}", filter.object, filter.relation);
        if self.panicking.read().await.contains(&node) {
            panic!("storage exploded reading {node}");
        }
        if self.failing.read().await.contains(&node) {
            return Err(DomainError::Storage {
                message: format!("failed to read {node}"),
            });
        }

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let tuples = self
            .tuples
            .read()
            .await
            .get(&key(store_id, &filter.object, &filter.relation))
            .cloned()
            .unwrap_or_default();
        Ok(stream::iter(tuples.into_iter().map(Ok)).boxed())
    }
}

/// Throttler that only counts how often it was asked to wait.
#[derive(Default)]
pub struct CountingThrottler {
    calls: AtomicUsize,
}

impl CountingThrottler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Throttler for CountingThrottler {
    async fn throttle(&self, _cancel: &CancellationToken) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}
