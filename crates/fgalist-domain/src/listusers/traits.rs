//! Storage seam for ListUsers resolution.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::DomainResult;
use crate::model::TupleKey;

use super::types::ConsistencyPreference;

/// Stream of tuples from a read. An `Err` item ends the read.
pub type TupleStream = BoxStream<'static, DomainResult<TupleKey>>;

/// Selects the tuples on one object and relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFilter {
    /// "type:id".
    pub object: String,
    pub relation: String,
}

impl ReadFilter {
    pub fn new(object: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            relation: relation.into(),
        }
    }

    pub fn matches(&self, tuple: &TupleKey) -> bool {
        tuple.object == self.object && tuple.relation == self.relation
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub consistency: ConsistencyPreference,
}

/// Trait for tuple storage operations needed by ListUsers.
#[async_trait]
pub trait TupleReader: Send + Sync {
    /// Reads the tuples matching `filter` in a store.
    async fn read(
        &self,
        store_id: &str,
        filter: &ReadFilter,
        options: &ReadOptions,
    ) -> DomainResult<TupleStream>;
}
