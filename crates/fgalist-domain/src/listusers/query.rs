//! ListUsers entry point and result aggregation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::cel::{CelConditionEvaluator, ConditionEvaluator};
use crate::error::DomainResult;
use crate::model::{TypeSystem, User};

use super::config::ListUsersConfig;
use super::context::ResolutionRequest;
use super::expand::{ExpandResponse, Expander, FOUND_USER_BUFFER};
use super::pool::task_failure;
use super::storage::RequestTupleReader;
use super::throttle::{ConstantRateThrottler, Throttler};
use super::traits::TupleReader;
use super::types::{
    FoundUser, ListUsersMetadata, ListUsersRequest, ListUsersResponse, RelationshipStatus,
};
use super::validation::validate_request;

/// Answers ListUsers requests for one authorization model.
pub struct ListUsersQuery {
    type_system: Arc<TypeSystem>,
    tuple_reader: Arc<dyn TupleReader>,
    conditions: Arc<dyn ConditionEvaluator>,
    throttler: Arc<dyn Throttler>,
    config: ListUsersConfig,
}

impl ListUsersQuery {
    /// Creates a query with the CEL condition evaluator and a constant rate
    /// throttler.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if `config` is invalid.
    pub fn new(
        type_system: Arc<TypeSystem>,
        tuple_reader: Arc<dyn TupleReader>,
        config: ListUsersConfig,
    ) -> DomainResult<Self> {
        config.validate()?;
        let throttler = Arc::new(ConstantRateThrottler::new(
            config.dispatch_throttling.frequency,
        ));
        Ok(Self {
            type_system,
            tuple_reader,
            conditions: Arc::new(CelConditionEvaluator::new()),
            throttler,
            config,
        })
    }

    pub fn with_condition_evaluator(mut self, conditions: Arc<dyn ConditionEvaluator>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_throttler(mut self, throttler: Arc<dyn Throttler>) -> Self {
        self.throttler = throttler;
        self
    }

    pub fn config(&self) -> &ListUsersConfig {
        &self.config
    }

    /// Lists the users that hold `request.relation` on `request.object`.
    ///
    /// Hitting the deadline or the result cap returns the users found so
    /// far with `truncated` set. Any other expansion error fails the call.
    #[instrument(
        skip(self, request),
        fields(
            store_id = %request.store_id,
            object = %request.object,
            relation = %request.relation
        )
    )]
    pub async fn list_users(&self, request: ListUsersRequest) -> DomainResult<ListUsersResponse> {
        let object = validate_request(&request, &self.type_system)?;
        let root = ResolutionRequest::root(object, request.relation.as_str());

        let cancel = CancellationToken::new();
        let reader = Arc::new(RequestTupleReader::new(
            Arc::clone(&self.tuple_reader),
            Arc::clone(&request.contextual_tuples),
            self.config.max_concurrent_reads,
        ));
        let expander = Arc::new(Expander::new(
            Arc::clone(&self.type_system),
            Arc::clone(&reader),
            Arc::clone(&self.conditions),
            Arc::clone(&self.throttler),
            self.config.clone(),
            request,
            cancel.clone(),
        ));

        let (tx, mut rx) = mpsc::channel(FOUND_USER_BUFFER);
        let expansion = {
            let expander = Arc::clone(&expander);
            tokio::spawn(async move { expander.expand(root, tx).await })
        };

        let deadline = self.config.deadline.map(|budget| Instant::now() + budget);
        let max_results = self.config.max_results as usize;
        let mut results = FoundUsers::default();
        let mut deadline_hit = false;
        let mut capped = false;

        loop {
            let next = match deadline {
                Some(deadline) => tokio::select! {
                    next = rx.recv() => next,
                    _ = tokio::time::sleep_until(deadline) => {
                        deadline_hit = true;
                        break;
                    }
                },
                None => rx.recv().await,
            };
            let Some(found) = next else {
                break;
            };
            results.insert(found);
            if max_results > 0 && results.with_relationship() >= max_results {
                capped = true;
                break;
            }
        }

        cancel.cancel();
        drop(rx);
        let response = expansion
            .await
            .unwrap_or_else(|e| ExpandResponse::error(task_failure(e)));

        if let Some(err) = response.err {
            if deadline_hit || err.is_cancellation() {
                warn!(
                    error = %err,
                    deadline_hit,
                    "ListUsers expansion stopped early, returning partial results"
                );
            } else {
                return Err(err);
            }
        }

        if deadline_hit {
            warn!(
                found = results.with_relationship(),
                "ListUsers deadline exceeded, results are partial"
            );
        }
        if capped {
            warn!(
                max_results,
                "ListUsers results truncated due to max_results limit"
            );
        }

        let metadata = ListUsersMetadata {
            datastore_query_count: reader.datastore_query_count(),
            datastore_item_count: reader.datastore_item_count(),
            dispatch_count: expander.dispatch_count(),
            was_throttled: expander.was_throttled(),
        };
        let (users, excluded_users) = results.into_users();
        debug!(
            users = users.len(),
            excluded_users = excluded_users.len(),
            dispatch_count = metadata.dispatch_count,
            datastore_query_count = metadata.datastore_query_count,
            "ListUsers completed"
        );

        Ok(ListUsersResponse {
            users,
            excluded_users,
            truncated: deadline_hit || capped,
            metadata,
        })
    }
}

/// Deduplicated found users.
///
/// The latest entry for a user wins, except that a `HasRelationship` entry
/// is never replaced by a `NoRelationship` one.
#[derive(Default)]
struct FoundUsers {
    by_key: HashMap<String, FoundUser>,
    with_relationship: usize,
}

impl FoundUsers {
    fn insert(&mut self, found: FoundUser) {
        let key = found.key();
        let previous_has = self.by_key.get(&key).map(FoundUser::has_relationship);
        if previous_has == Some(true) && !found.has_relationship() {
            return;
        }

        if found.has_relationship() && previous_has != Some(true) {
            self.with_relationship += 1;
        }
        self.by_key.insert(key, found);
    }

    fn with_relationship(&self) -> usize {
        self.with_relationship
    }

    /// Returned users and the users excluded from them, both sorted.
    fn into_users(self) -> (Vec<User>, Vec<User>) {
        let mut excluded: HashMap<String, User> = HashMap::new();
        let mut users = Vec::with_capacity(self.with_relationship);
        for (key, found) in self.by_key {
            for user in found.excluded_users {
                excluded.insert(user.to_string(), user);
            }
            if found.status == RelationshipStatus::HasRelationship {
                users.push((key, found.user));
            }
        }
        users.sort_by(|a, b| a.0.cmp(&b.0));

        let mut excluded: Vec<(String, User)> = excluded
            .into_iter()
            .filter(|(key, _)| users.binary_search_by(|(k, _)| k.cmp(key)).is_err())
            .collect();
        excluded.sort_by(|a, b| a.0.cmp(&b.0));

        (
            users.into_iter().map(|(_, user)| user).collect(),
            excluded.into_iter().map(|(_, user)| user).collect(),
        )
    }
}
