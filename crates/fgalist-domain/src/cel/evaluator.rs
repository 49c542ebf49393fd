//! Evaluation of relationship conditions.

use std::collections::HashMap;

use crate::model::{Condition, TupleKey};

use super::cache::CelExpressionCache;
use super::context::{CelContext, CelValue};
use super::error::{CelError, ConditionError};

/// Evaluates the condition attached to a relationship tuple.
pub trait ConditionEvaluator: Send + Sync {
    /// Returns whether `condition` holds for `tuple` under the request context.
    ///
    /// `ConditionError::EvaluationFailed` means the tuple should be skipped;
    /// other errors are fatal for the current scan.
    fn evaluate(
        &self,
        tuple: &TupleKey,
        condition: &Condition,
        context: &HashMap<String, serde_json::Value>,
    ) -> Result<bool, ConditionError>;
}

/// `ConditionEvaluator` backed by `cel-interpreter`.
#[derive(Debug, Default)]
pub struct CelConditionEvaluator {
    cache: CelExpressionCache,
}

impl CelConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled-expression cache.
    pub fn cache(&self) -> &CelExpressionCache {
        &self.cache
    }
}

impl ConditionEvaluator for CelConditionEvaluator {
    fn evaluate(
        &self,
        tuple: &TupleKey,
        condition: &Condition,
        context: &HashMap<String, serde_json::Value>,
    ) -> Result<bool, ConditionError> {
        let expression =
            self.cache
                .get_or_parse(&condition.expression)
                .map_err(|source| ConditionError::Compile {
                    name: condition.name.clone(),
                    source,
                })?;

        let type_hints: HashMap<&str, &str> = condition
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.type_name.as_str()))
            .collect();

        // Tuple values override request values.
        let mut merged: HashMap<&str, &serde_json::Value> =
            context.iter().map(|(k, v)| (k.as_str(), v)).collect();
        if let Some(stored) = &tuple.condition {
            merged.extend(stored.context.iter().map(|(k, v)| (k.as_str(), v)));
        }

        let mut cel_context = CelContext::new();
        for (name, value) in &merged {
            let hint = type_hints.get(name).copied();
            cel_context.set(*name, CelValue::from_json(value, hint));
        }

        let mut missing: Vec<&str> = condition
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .filter(|name| !cel_context.contains(name))
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(ConditionError::EvaluationFailed {
                name: condition.name.clone(),
                message: format!(
                    "tuple '{}' is missing context parameters '{}'",
                    tuple,
                    missing.join("', '")
                ),
            });
        }

        expression
            .evaluate_bool(&cel_context)
            .map_err(|e| ConditionError::EvaluationFailed {
                name: condition.name.clone(),
                message: match e {
                    CelError::EvaluationError { message, .. } => message,
                    other => other.to_string(),
                },
            })
    }
}
