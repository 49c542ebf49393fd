//! Answers ListUsers queries against a loaded fixture.

use std::sync::Arc;

use tracing::info;

use fgalist_domain::error::DomainResult;
use fgalist_domain::listusers::{ListUsersConfig, ListUsersQuery, ListUsersRequest, ListUsersResponse};
use fgalist_domain::model::TypeSystem;
use fgalist_storage::MemoryDataStore;

use crate::adapters::DataStoreTupleReader;
use crate::fixtures::{Fixture, FixtureError};

/// A fixture loaded into a memory store, ready to be queried.
pub struct Runner {
    store_id: String,
    query: ListUsersQuery,
}

impl Runner {
    /// Loads `fixture` into a fresh memory store named `store_id`.
    pub async fn new(
        fixture: Fixture,
        store_id: impl Into<String>,
        config: ListUsersConfig,
    ) -> Result<Self, RunnerError> {
        let store_id = store_id.into();
        let storage = MemoryDataStore::new_shared();
        fixture.load_into(storage.as_ref(), &store_id).await?;

        let type_system = Arc::new(TypeSystem::new(fixture.model));
        let reader = Arc::new(DataStoreTupleReader::new(storage));
        let query = ListUsersQuery::new(type_system, reader, config)?;
        info!(store_id = %store_id, "fixture ready");

        Ok(Self { store_id, query })
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// Runs one request; its store ID is replaced with the fixture's store.
    pub async fn list_users(&self, mut request: ListUsersRequest) -> DomainResult<ListUsersResponse> {
        request.store_id = self.store_id.clone();
        self.query.list_users(request).await
    }
}

/// Errors raised while preparing a runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Domain(#[from] fgalist_domain::DomainError),
}
