//! CEL-specific error types

use thiserror::Error;

/// Errors that can occur during CEL expression parsing and evaluation
#[derive(Debug, Error)]
pub enum CelError {
    /// Failed to parse the CEL expression
    #[error("failed to parse CEL expression '{expression}': {message}")]
    ParseError { expression: String, message: String },

    /// Failed to evaluate the CEL expression
    #[error("failed to evaluate CEL expression '{expression}': {message}")]
    EvaluationError { expression: String, message: String },

    /// Type mismatch during evaluation
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeError { expected: String, actual: String },
}

/// Errors from evaluating the condition attached to a relationship tuple.
///
/// Only `EvaluationFailed` is recoverable: the tuple is skipped and the scan
/// goes on. Every other kind stops the scan.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// The tuple names a condition the model does not define.
    #[error("condition '{name}' is not defined in the authorization model")]
    NotFound { name: String },

    /// The condition expression does not compile.
    #[error("condition '{name}' failed to compile: {source}")]
    Compile {
        name: String,
        #[source]
        source: CelError,
    },

    /// The condition could not be evaluated for this tuple.
    #[error("failed to evaluate relationship condition '{name}': {message}")]
    EvaluationFailed { name: String, message: String },
}

impl ConditionError {
    /// Whether the scan may skip the tuple and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConditionError::EvaluationFailed { .. })
    }
}
