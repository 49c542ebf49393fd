//! Per-branch expansion state.

use std::collections::HashSet;
use std::sync::Arc;

use crate::model::Object;

/// Depth and visited path of one branch of the expansion.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExpansionState {
    pub(crate) depth: u32,
    /// "type:id#relation" keys on the current path. Copied on write, so
    /// sibling branches never see each other's entries.
    visited: Arc<HashSet<String>>,
}

impl ExpansionState {
    /// Records `key` on the path. Returns false if it was already there.
    pub(crate) fn visit(&mut self, key: String) -> bool {
        if self.visited.contains(&key) {
            return false;
        }
        Arc::make_mut(&mut self.visited).insert(key);
        true
    }
}

/// The node being expanded.
///
/// Everything that never changes during the expansion (filters, context,
/// consistency) lives on the expander instead.
#[derive(Debug, Clone)]
pub(crate) struct ResolutionRequest {
    pub(crate) object: Object,
    pub(crate) relation: String,
    pub(crate) state: ExpansionState,
}

impl ResolutionRequest {
    pub(crate) fn root(object: Object, relation: impl Into<String>) -> Self {
        Self {
            object,
            relation: relation.into(),
            state: ExpansionState::default(),
        }
    }

    /// A request for another node on the same path.
    pub(crate) fn clone_for(&self, object: Object, relation: impl Into<String>) -> Self {
        Self {
            object,
            relation: relation.into(),
            state: self.state.clone(),
        }
    }

    pub(crate) fn path_key(&self) -> String {
        format!("{}#{}", self.object, self.relation)
    }
}
