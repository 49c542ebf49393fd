//! Recursive expansion of a relation into the users that hold it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::cel::{ConditionError, ConditionEvaluator};
use crate::error::{join_errors, DomainError, DomainResult};
use crate::model::{Object, TupleKey, TypeSystem, User, Userset};

use super::config::ListUsersConfig;
use super::context::ResolutionRequest;
use super::pool::BoundedPool;
use super::storage::RequestTupleReader;
use super::throttle::{should_throttle, Throttler};
use super::traits::{ReadFilter, ReadOptions, TupleReader, TupleStream};
use super::types::{FoundUser, ListUsersRequest};

/// Type alias for boxed futures used in recursive async calls.
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(crate) type FoundUserSender = mpsc::Sender<FoundUser>;

/// Capacity of every found-user channel.
pub(crate) const FOUND_USER_BUFFER: usize = 100;

/// Outcome of expanding one node.
#[derive(Debug, Default)]
pub(crate) struct ExpandResponse {
    pub(crate) err: Option<DomainError>,
    /// The branch revisited a node already on its path.
    pub(crate) has_cycle: bool,
}

impl ExpandResponse {
    pub(crate) fn ok() -> Self {
        Self::default()
    }

    pub(crate) fn cycle() -> Self {
        Self {
            err: None,
            has_cycle: true,
        }
    }

    pub(crate) fn error(err: DomainError) -> Self {
        Self {
            err: Some(err),
            has_cycle: false,
        }
    }

    pub(crate) fn into_result(self) -> DomainResult<()> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// What a scanned subject turns into.
enum Step {
    Emit(User),
    Dispatch(ResolutionRequest),
    Skip,
}

/// Shared state of one ListUsers query.
pub(crate) struct Expander {
    pub(crate) type_system: Arc<TypeSystem>,
    pub(crate) reader: Arc<RequestTupleReader>,
    pub(crate) conditions: Arc<dyn ConditionEvaluator>,
    pub(crate) throttler: Arc<dyn Throttler>,
    pub(crate) config: ListUsersConfig,
    pub(crate) request: ListUsersRequest,
    pub(crate) cancel: CancellationToken,
    dispatch_count: AtomicU32,
    was_throttled: AtomicBool,
}

impl Expander {
    pub(crate) fn new(
        type_system: Arc<TypeSystem>,
        reader: Arc<RequestTupleReader>,
        conditions: Arc<dyn ConditionEvaluator>,
        throttler: Arc<dyn Throttler>,
        config: ListUsersConfig,
        request: ListUsersRequest,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            type_system,
            reader,
            conditions,
            throttler,
            config,
            request,
            cancel,
            dispatch_count: AtomicU32::new(0),
            was_throttled: AtomicBool::new(false),
        }
    }

    pub(crate) fn dispatch_count(&self) -> u32 {
        self.dispatch_count.load(Ordering::Relaxed)
    }

    pub(crate) fn was_throttled(&self) -> bool {
        self.was_throttled.load(Ordering::Relaxed)
    }

    /// Key of the wildcard for the first requested subject type.
    pub(crate) fn wildcard_key(&self) -> Option<String> {
        self.request
            .user_filters
            .first()
            .map(|filter| User::wildcard(filter.type_name.as_str()).to_string())
    }

    /// Sends a found user unless the query has been cancelled.
    pub(crate) async fn send(&self, tx: &FoundUserSender, found: FoundUser) {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            _ = tx.send(found) => {}
        }
    }

    /// Expands `req` into the users that hold its relation.
    pub(crate) fn expand(
        self: &Arc<Self>,
        mut req: ResolutionRequest,
        tx: FoundUserSender,
    ) -> BoxFuture<'static, ExpandResponse> {
        let this = Arc::clone(self);
        Box::pin(async move {
            let limit = this.config.resolve_node_limit;
            if req.state.depth >= limit {
                return ExpandResponse::error(DomainError::ResolutionDepthExceeded {
                    max_depth: limit,
                });
            }
            req.state.depth += 1;

            let key = req.path_key();
            if !req.state.visit(key) {
                trace!(node = %req.path_key(), "cycle on expansion path");
                return ExpandResponse::cycle();
            }

            let is_requested_userset = this.request.user_filters.iter().any(|filter| {
                filter.type_name == req.object.object_type
                    && filter.relation.as_deref() == Some(req.relation.as_str())
            });
            if is_requested_userset {
                let user = User::userset(
                    req.object.object_type.as_str(),
                    req.object.object_id.as_str(),
                    req.relation.as_str(),
                );
                this.send(&tx, FoundUser::has(user)).await;
            }

            let relation = match this
                .type_system
                .get_relation(&req.object.object_type, &req.relation)
            {
                Ok(relation) => relation,
                Err(DomainError::RelationNotFound { .. }) => return ExpandResponse::ok(),
                Err(e) => return ExpandResponse::error(e),
            };

            this.expand_rewrite(req, relation.rewrite.clone(), tx).await
        })
    }

    /// Evaluates one rewrite node.
    pub(crate) fn expand_rewrite(
        self: &Arc<Self>,
        req: ResolutionRequest,
        rewrite: Userset,
        tx: FoundUserSender,
    ) -> BoxFuture<'static, ExpandResponse> {
        let this = Arc::clone(self);
        Box::pin(async move {
            match rewrite {
                Userset::This => this.expand_direct(req, tx).await,
                Userset::ComputedUserset { relation } => {
                    let child = req.clone_for(req.object.clone(), relation);
                    this.dispatch(child, tx).await
                }
                Userset::TupleToUserset {
                    tupleset,
                    computed_userset,
                } => {
                    this.expand_tuple_to_userset(req, &tupleset, &computed_userset, tx)
                        .await
                }
                Userset::Union { children } => this.expand_union(req, children, tx).await,
                Userset::Intersection { children } => {
                    this.expand_intersection(req, children, tx).await
                }
                Userset::Exclusion { base, subtract } => {
                    this.expand_exclusion(req, *base, *subtract, tx).await
                }
            }
        })
    }

    /// Counts, possibly throttles, then expands a sub-request.
    pub(crate) async fn dispatch(
        self: &Arc<Self>,
        req: ResolutionRequest,
        tx: FoundUserSender,
    ) -> ExpandResponse {
        if self.cancel.is_cancelled() {
            return ExpandResponse::error(DomainError::Cancelled);
        }

        let count = self.dispatch_count.fetch_add(1, Ordering::Relaxed) + 1;
        let throttling = &self.config.dispatch_throttling;
        if throttling.enabled
            && should_throttle(
                count,
                throttling.threshold,
                throttling.max_threshold,
                self.request.dispatch_throttling_threshold.unwrap_or(0),
            )
        {
            self.was_throttled.store(true, Ordering::Relaxed);
            debug!(dispatch_count = count, node = %req.path_key(), "throttling dispatch");
            self.throttler.throttle(&self.cancel).await;
        }

        self.expand(req, tx).await
    }

    async fn expand_direct(
        self: &Arc<Self>,
        req: ResolutionRequest,
        tx: FoundUserSender,
    ) -> ExpandResponse {
        let relation = req.relation.clone();
        self.scan(&req, &relation, &tx, |user| match user {
            User::Userset {
                userset_type,
                userset_id,
                relation,
            } => Step::Dispatch(req.clone_for(Object::new(userset_type, userset_id), relation)),
            terminal if self.is_requested_type(terminal.user_type()) => Step::Emit(terminal),
            _ => Step::Skip,
        })
        .await
    }

    async fn expand_tuple_to_userset(
        self: &Arc<Self>,
        req: ResolutionRequest,
        tupleset: &str,
        computed_relation: &str,
        tx: FoundUserSender,
    ) -> ExpandResponse {
        self.scan(&req, tupleset, &tx, |user| match user {
            User::Object { user_type, user_id } => {
                Step::Dispatch(req.clone_for(Object::new(user_type, user_id), computed_relation))
            }
            _ => Step::Skip,
        })
        .await
    }

    /// Whether a concrete or wildcard subject of this type was requested.
    fn is_requested_type(&self, user_type: &str) -> bool {
        self.request
            .user_filters
            .iter()
            .any(|filter| filter.type_name == user_type && filter.relation.is_none())
    }

    /// Reads `req.object#relation` and handles each admitted subject.
    ///
    /// Condition evaluation failures skip the tuple; any other failure stops
    /// the scan. Dispatches run in a bounded pool and their errors are joined.
    async fn scan<F>(
        self: &Arc<Self>,
        req: &ResolutionRequest,
        relation: &str,
        tx: &FoundUserSender,
        step: F,
    ) -> ExpandResponse
    where
        F: Fn(User) -> Step + Sync,
    {
        let mut tuples = match self.read(&req.object, relation).await {
            Ok(tuples) => tuples,
            Err(e) => return ExpandResponse::error(e),
        };

        let mut errors = Vec::new();
        let mut pool = BoundedPool::new(self.config.resolve_node_breadth_limit, self.cancel.clone());
        let has_cycle = Arc::new(AtomicBool::new(false));

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    errors.push(DomainError::Cancelled);
                    break;
                }
                next = tuples.next() => next,
            };
            let tuple = match next {
                None => break,
                Some(Ok(tuple)) => tuple,
                Some(Err(e)) => {
                    errors.push(e);
                    break;
                }
            };

            let user = match self.admit(&req.object.object_type, &tuple) {
                Ok(Some(user)) => user,
                Ok(None) => continue,
                Err(e) if e.is_recoverable() => {
                    errors.push(e.into());
                    continue;
                }
                Err(e) => {
                    errors.push(e.into());
                    break;
                }
            };

            match step(user) {
                Step::Emit(user) => self.send(tx, FoundUser::has(user)).await,
                Step::Dispatch(child) => {
                    let this = Arc::clone(self);
                    let tx = tx.clone();
                    let has_cycle = Arc::clone(&has_cycle);
                    pool.spawn(async move {
                        let response = this.dispatch(child, tx).await;
                        if response.has_cycle {
                            has_cycle.store(true, Ordering::Relaxed);
                        }
                        response.into_result()
                    })
                    .await;
                }
                Step::Skip => {}
            }
        }

        errors.extend(pool.wait().await);
        ExpandResponse {
            err: join_errors(errors),
            has_cycle: has_cycle.load(Ordering::Relaxed),
        }
    }

    async fn read(&self, object: &Object, relation: &str) -> DomainResult<TupleStream> {
        let filter = ReadFilter::new(object.to_string(), relation);
        let options = ReadOptions {
            consistency: self.request.consistency,
        };
        self.reader
            .read(&self.request.store_id, &filter, &options)
            .await
    }

    /// Parses a read tuple and decides whether it applies.
    ///
    /// Returns `Ok(None)` for malformed, invalid or condition-false tuples.
    fn admit(&self, object_type: &str, tuple: &TupleKey) -> Result<Option<User>, ConditionError> {
        let user = match User::parse(&tuple.user) {
            Ok(user) => user,
            Err(reason) => {
                warn!(tuple = %tuple, reason, "Skipping tuple with malformed user");
                return Ok(None);
            }
        };

        if !self
            .type_system
            .is_tuple_valid(object_type, &tuple.relation, &user)
        {
            trace!(tuple = %tuple, "Skipping tuple not allowed by the model");
            return Ok(None);
        }

        if let Some(stored) = &tuple.condition {
            let condition = self.type_system.find_condition(&stored.name).ok_or_else(|| {
                ConditionError::NotFound {
                    name: stored.name.clone(),
                }
            })?;
            if !self
                .conditions
                .evaluate(tuple, condition, &self.request.context)?
            {
                return Ok(None);
            }
        }

        Ok(Some(user))
    }
}
