//! Union, intersection and exclusion evaluators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::debug;

use crate::error::{join_errors, DomainError};
use crate::model::{User, Userset};

use super::context::ResolutionRequest;
use super::expand::{ExpandResponse, Expander, FoundUserSender, FOUND_USER_BUFFER};
use super::pool::{task_failure, BoundedPool};
use super::types::{FoundUser, RelationshipStatus};

/// Users produced by one branch, keyed by user.
type BranchUsers = HashMap<String, FoundUser>;

/// Collects a branch's output. A `HasRelationship` entry is never replaced
/// by a `NoRelationship` one for the same user.
async fn drain(mut rx: mpsc::Receiver<FoundUser>) -> BranchUsers {
    let mut users = BranchUsers::new();
    while let Some(found) = rx.recv().await {
        let key = found.key();
        let keep_existing = users.get(&key).is_some_and(FoundUser::has_relationship);
        if !keep_existing {
            users.insert(key, found);
        }
    }
    users
}

/// How one user fared across the children of an intersection.
struct Occurrence {
    user: User,
    /// Children without a wildcard that returned the user.
    found: usize,
    /// Children with a wildcard that returned the user as `NoRelationship`.
    negated_by_wildcard: usize,
}

impl Occurrence {
    fn new(user: User) -> Self {
        Self {
            user,
            found: 0,
            negated_by_wildcard: 0,
        }
    }
}

struct FanOut {
    err: Option<DomainError>,
    has_cycle: bool,
    per_child: Vec<BranchUsers>,
}

fn joined_response(result: Result<ExpandResponse, JoinError>) -> ExpandResponse {
    result.unwrap_or_else(|e| ExpandResponse::error(task_failure(e)))
}

fn negate(status: RelationshipStatus) -> RelationshipStatus {
    match status {
        RelationshipStatus::HasRelationship => RelationshipStatus::NoRelationship,
        RelationshipStatus::NoRelationship => RelationshipStatus::HasRelationship,
    }
}

impl Expander {
    /// Runs every child in a bounded pool while draining their channels.
    ///
    /// Draining runs alongside spawning: with fewer permits than children,
    /// waiting for a permit would otherwise block on full channels.
    async fn fan_out(self: &Arc<Self>, req: &ResolutionRequest, children: Vec<Userset>) -> FanOut {
        let has_cycle = Arc::new(AtomicBool::new(false));
        let (senders, receivers): (Vec<_>, Vec<_>) = children
            .iter()
            .map(|_| mpsc::channel(FOUND_USER_BUFFER))
            .unzip();

        let mut pool = BoundedPool::new(self.config.resolve_node_breadth_limit, self.cancel.clone());
        let cycle_flag = Arc::clone(&has_cycle);
        let spawning = async move {
            for (child, tx) in children.into_iter().zip(senders) {
                let this = Arc::clone(self);
                let req = req.clone();
                let cycle_flag = Arc::clone(&cycle_flag);
                pool.spawn(async move {
                    let response = this.expand_rewrite(req, child, tx).await;
                    if response.has_cycle {
                        cycle_flag.store(true, Ordering::Relaxed);
                    }
                    response.into_result()
                })
                .await;
            }
            pool.wait().await
        };
        let draining = join_all(receivers.into_iter().map(drain));

        let (err, per_child) = tokio::join!(spawning, draining);
        FanOut {
            err,
            has_cycle: has_cycle.load(Ordering::Relaxed),
            per_child,
        }
    }

    /// Users found by any child.
    ///
    /// A user carried as excluded survives only if every child excluded it,
    /// and a `NoRelationship` user is forwarded only if every child said so.
    pub(crate) async fn expand_union(
        self: &Arc<Self>,
        req: ResolutionRequest,
        children: Vec<Userset>,
        tx: FoundUserSender,
    ) -> ExpandResponse {
        let child_count = children.len();
        let fan_out = self.fan_out(&req, children).await;

        let mut found: HashMap<String, User> = HashMap::new();
        let mut negated: HashMap<String, (User, usize)> = HashMap::new();
        let mut excluded: HashMap<String, (User, usize)> = HashMap::new();

        for child in &fan_out.per_child {
            let mut child_excluded: HashMap<String, &User> = HashMap::new();
            for (key, user) in child {
                match user.status {
                    RelationshipStatus::HasRelationship => {
                        found.insert(key.clone(), user.user.clone());
                    }
                    RelationshipStatus::NoRelationship => {
                        negated
                            .entry(key.clone())
                            .or_insert_with(|| (user.user.clone(), 0))
                            .1 += 1;
                    }
                }
                for excluded_user in &user.excluded_users {
                    child_excluded.insert(excluded_user.to_string(), excluded_user);
                }
            }
            for (key, user) in child_excluded {
                excluded.entry(key).or_insert_with(|| (user.clone(), 0)).1 += 1;
            }
        }

        let excluded_everywhere: Vec<User> = excluded
            .into_values()
            .filter(|(_, count)| *count == child_count)
            .map(|(user, _)| user)
            .collect();

        for (key, (user, count)) in negated {
            if count == child_count && !found.contains_key(&key) {
                let found_user = FoundUser::no(user).with_excluded(excluded_everywhere.clone());
                self.send(&tx, found_user).await;
            }
        }
        for user in found.into_values() {
            let found_user = FoundUser::has(user).with_excluded(excluded_everywhere.clone());
            self.send(&tx, found_user).await;
        }

        ExpandResponse {
            err: fan_out.err,
            has_cycle: fan_out.has_cycle,
        }
    }

    /// Users found by every child, a child's wildcard standing in for any
    /// user of that type.
    ///
    /// A wildcard does not stand in for a user its own child negated. Such a
    /// user is forwarded as `NoRelationship` when every other child has it,
    /// so an enclosing exclusion or the final result still sees the gap.
    pub(crate) async fn expand_intersection(
        self: &Arc<Self>,
        req: ResolutionRequest,
        children: Vec<Userset>,
        tx: FoundUserSender,
    ) -> ExpandResponse {
        let child_count = children.len();
        let fan_out = self.fan_out(&req, children).await;
        let wildcard_key = self.wildcard_key();

        let mut occurrences: HashMap<String, Occurrence> = HashMap::new();
        let mut wildcard_children = 0;
        let mut excluded: HashMap<String, User> = HashMap::new();

        for child in &fan_out.per_child {
            let child_has_wildcard = wildcard_key
                .as_ref()
                .is_some_and(|key| child.get(key).is_some_and(FoundUser::has_relationship));
            if child_has_wildcard {
                wildcard_children += 1;
            }

            for (key, user) in child {
                for excluded_user in &user.excluded_users {
                    excluded.insert(excluded_user.to_string(), excluded_user.clone());
                }
                let entry = occurrences
                    .entry(key.clone())
                    .or_insert_with(|| Occurrence::new(user.user.clone()));
                match (user.status, child_has_wildcard) {
                    // The wildcard already counts this child for every user.
                    (RelationshipStatus::HasRelationship, true) => {}
                    (RelationshipStatus::HasRelationship, false) => entry.found += 1,
                    (RelationshipStatus::NoRelationship, true) => entry.negated_by_wildcard += 1,
                    (RelationshipStatus::NoRelationship, false) => {}
                }
            }
        }

        let excluded: Vec<User> = excluded.into_values().collect();
        for occurrence in occurrences.into_values() {
            if occurrence.found + wildcard_children != child_count {
                continue;
            }
            let found_user = if occurrence.negated_by_wildcard == 0 {
                FoundUser::has(occurrence.user)
            } else {
                FoundUser::no(occurrence.user)
            };
            self.send(&tx, found_user.with_excluded(excluded.clone())).await;
        }

        ExpandResponse {
            err: fan_out.err,
            has_cycle: fan_out.has_cycle,
        }
    }

    /// Users of `base` that are not in `subtract`.
    ///
    /// Both branches are drained completely before anything is emitted,
    /// since a late subtract result can still negate a base result.
    pub(crate) async fn expand_exclusion(
        self: &Arc<Self>,
        req: ResolutionRequest,
        base: Userset,
        subtract: Userset,
        tx: FoundUserSender,
    ) -> ExpandResponse {
        let (base_tx, base_rx) = mpsc::channel(FOUND_USER_BUFFER);
        let (subtract_tx, subtract_rx) = mpsc::channel(FOUND_USER_BUFFER);

        let base_task = {
            let this = Arc::clone(self);
            let req = req.clone();
            tokio::spawn(async move { this.expand_rewrite(req, base, base_tx).await })
        };
        let subtract_task = {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.expand_rewrite(req, subtract, subtract_tx).await })
        };

        let (base_users, subtract_users) = tokio::join!(drain(base_rx), drain(subtract_rx));
        let (base_result, subtract_result) = tokio::join!(base_task, subtract_task);
        let base_response = joined_response(base_result);
        let subtract_response = joined_response(subtract_result);

        // A cyclic subtract is vacuous: its cycle and its errors are dropped.
        // The base branch is still real, so its failures still surface.
        if subtract_response.has_cycle {
            debug!("Subtract branch is cyclic, passing base users through");
            for user in base_users.into_values() {
                self.send(&tx, user).await;
            }
            return ExpandResponse {
                err: base_response.err,
                has_cycle: false,
            };
        }

        for user in exclusion_outcome(&base_users, &subtract_users, self.wildcard_key()) {
            self.send(&tx, user).await;
        }

        ExpandResponse {
            err: join_errors(base_response.err.into_iter().chain(subtract_response.err)),
            has_cycle: base_response.has_cycle,
        }
    }
}

/// Applies the exclusion decision table to two drained branches.
fn exclusion_outcome(
    base: &BranchUsers,
    subtract: &BranchUsers,
    wildcard_key: Option<String>,
) -> Vec<FoundUser> {
    let contains_wildcard = |users: &BranchUsers| {
        wildcard_key
            .as_ref()
            .is_some_and(|key| users.contains_key(key))
    };
    let base_has_wildcard = contains_wildcard(base);
    let wildcard_subtracted = contains_wildcard(subtract);

    let mut outcome = Vec::new();
    for (key, found) in base {
        let subtracted = subtract.get(key);

        if base_has_wildcard {
            match (subtracted, wildcard_subtracted) {
                (None, false) => outcome.push(FoundUser::has(found.user.clone())),
                (None, true) => outcome.push(FoundUser::no(found.user.clone())),
                (Some(_), _) => {}
            }
        } else if subtracted.is_some() || wildcard_subtracted {
            let subtract_status = subtracted.map(|s| s.status).unwrap_or_default();
            outcome.push(FoundUser::has(found.user.clone()).with_status(negate(subtract_status)));
        } else {
            outcome.push(found.clone());
        }
    }

    if base_has_wildcard {
        for found in subtract.values().filter(|found| !found.user.is_wildcard()) {
            let user = found.user.clone();
            match found.status {
                RelationshipStatus::NoRelationship => outcome.push(FoundUser::has(user)),
                RelationshipStatus::HasRelationship => {
                    outcome.push(FoundUser::no(user.clone()).with_excluded(vec![user]))
                }
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(users: &[(&str, RelationshipStatus)]) -> BranchUsers {
        users
            .iter()
            .map(|(raw, status)| {
                let user = User::parse(raw).unwrap();
                (user.to_string(), FoundUser::has(user).with_status(*status))
            })
            .collect()
    }

    fn status_of(outcome: &[FoundUser], key: &str) -> Vec<RelationshipStatus> {
        outcome
            .iter()
            .filter(|f| f.key() == key)
            .map(|f| f.status)
            .collect()
    }

    use RelationshipStatus::{HasRelationship as Has, NoRelationship as No};

    fn wildcard() -> Option<String> {
        Some("user:*".to_string())
    }

    #[test]
    fn test_plain_subtraction_negates_subtracted_users() {
        let base = branch(&[("user:alice", Has), ("user:bob", Has)]);
        let subtract = branch(&[("user:bob", Has)]);

        let outcome = exclusion_outcome(&base, &subtract, wildcard());
        assert_eq!(status_of(&outcome, "user:alice"), vec![Has]);
        assert_eq!(status_of(&outcome, "user:bob"), vec![No]);
    }

    #[test]
    fn test_double_negative_restores_relationship() {
        let base = branch(&[("user:alice", Has)]);
        let subtract = branch(&[("user:alice", No)]);

        let outcome = exclusion_outcome(&base, &subtract, wildcard());
        assert_eq!(status_of(&outcome, "user:alice"), vec![Has]);
    }

    #[test]
    fn test_untouched_users_keep_their_status() {
        let base = branch(&[("user:alice", No)]);
        let subtract = branch(&[("user:bob", Has)]);

        let outcome = exclusion_outcome(&base, &subtract, wildcard());
        assert_eq!(status_of(&outcome, "user:alice"), vec![No]);
        assert!(status_of(&outcome, "user:bob").is_empty());
    }

    #[test]
    fn test_wildcard_base_records_subtracted_users_as_excluded() {
        let base = branch(&[("user:*", Has)]);
        let subtract = branch(&[("user:eve", Has)]);

        let outcome = exclusion_outcome(&base, &subtract, wildcard());
        assert_eq!(status_of(&outcome, "user:*"), vec![Has]);

        let eve = outcome.iter().find(|f| f.key() == "user:eve").unwrap();
        assert_eq!(eve.status, No);
        assert_eq!(eve.excluded_users, vec![User::object("user", "eve")]);
    }

    #[test]
    fn test_wildcard_base_readds_negated_subtract_users() {
        let base = branch(&[("user:*", Has)]);
        let subtract = branch(&[("user:carol", No)]);

        let outcome = exclusion_outcome(&base, &subtract, wildcard());
        assert_eq!(status_of(&outcome, "user:carol"), vec![Has]);
    }

    #[test]
    fn test_subtracted_wildcard_removes_every_base_user() {
        let base = branch(&[("user:*", Has), ("user:alice", Has)]);
        let subtract = branch(&[("user:*", Has)]);

        let outcome = exclusion_outcome(&base, &subtract, wildcard());
        assert_eq!(status_of(&outcome, "user:alice"), vec![No]);
        assert!(outcome.iter().all(|f| !f.has_relationship()));
    }

    #[test]
    fn test_subtracted_wildcard_without_base_wildcard_flips_users() {
        let base = branch(&[("user:alice", Has)]);
        let subtract = branch(&[("user:*", Has)]);

        let outcome = exclusion_outcome(&base, &subtract, wildcard());
        assert_eq!(status_of(&outcome, "user:alice"), vec![No]);
    }
}
