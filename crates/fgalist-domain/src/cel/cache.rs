//! Cache of compiled CEL expressions keyed by source text.
//!
//! Compiling an expression lexes and parses it, so conditions evaluated once
//! per tuple are compiled once per evaluator instead.

use std::sync::Arc;

use dashmap::DashMap;

use super::expression::CelExpression;
use super::CelResult;

/// Thread-safe cache of parsed expressions.
#[derive(Debug, Default)]
pub struct CelExpressionCache {
    entries: DashMap<String, Arc<CelExpression>>,
}

impl CelExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached expression, compiling and caching it on a miss.
    ///
    /// Parse failures are not cached.
    pub fn get_or_parse(&self, source: &str) -> CelResult<Arc<CelExpression>> {
        if let Some(cached) = self.entries.get(source) {
            return Ok(Arc::clone(cached.value()));
        }

        let expression = Arc::new(CelExpression::parse(source)?);
        self.entries
            .insert(source.to_string(), Arc::clone(&expression));
        Ok(expression)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached expression, e.g. after a model change.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }
}
