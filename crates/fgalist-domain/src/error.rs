//! Domain error types for ListUsers resolution.

use thiserror::Error;

use crate::cel::ConditionError;

/// Domain-specific errors for authorization operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Error during resolution that has no more specific variant.
    #[error("resolver error: {message}")]
    ResolverError { message: String },

    /// The recursion depth reached the configured resolve node limit.
    #[error("resolution depth exceeded (max: {max_depth})")]
    ResolutionDepthExceeded { max_depth: u32 },

    /// Invalid user format.
    #[error("invalid user format: {value}")]
    InvalidUserFormat { value: String },

    /// Invalid object format.
    #[error("invalid object format: {value}")]
    InvalidObjectFormat { value: String },

    /// Invalid relation format.
    #[error("invalid relation format: {value}")]
    InvalidRelationFormat { value: String },

    /// A user filter in the request is malformed.
    #[error("invalid user filter: {message}")]
    InvalidUserFilter { message: String },

    /// A contextual tuple does not fit the authorization model.
    #[error("invalid contextual tuple '{tuple}': {reason}")]
    InvalidContextualTuple { tuple: String, reason: String },

    /// Type not found in authorization model.
    #[error("type not found: {type_name}")]
    TypeNotFound { type_name: String },

    /// Relation not found on type.
    #[error("relation '{relation}' not found on type '{type_name}'")]
    RelationNotFound { type_name: String, relation: String },

    /// Failure reported by the tuple reader.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Condition evaluation failure.
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// A pooled task panicked; the panic payload is kept as the message.
    #[error("task panicked: {message}")]
    TaskPanicked { message: String },

    /// The query was cancelled or its deadline fired.
    #[error("resolution cancelled")]
    Cancelled,

    /// Invalid engine configuration.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Several independent failures from concurrent branches.
    #[error("{}", join_messages(.0))]
    Multiple(Vec<DomainError>),
}

fn join_messages(errors: &[DomainError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl DomainError {
    /// Returns true if this error, or any error joined into it, comes from
    /// cancellation rather than from the resolution itself.
    pub fn is_cancellation(&self) -> bool {
        match self {
            DomainError::Cancelled => true,
            DomainError::Multiple(errors) => errors.iter().any(DomainError::is_cancellation),
            _ => false,
        }
    }

    /// Returns true if this error, or any error joined into it, is a depth
    /// limit failure.
    pub fn is_depth_exceeded(&self) -> bool {
        match self {
            DomainError::ResolutionDepthExceeded { .. } => true,
            DomainError::Multiple(errors) => errors.iter().any(DomainError::is_depth_exceeded),
            _ => false,
        }
    }

    /// Iterates over the leaf errors, flattening any joins.
    pub fn leaves(&self) -> Vec<&DomainError> {
        match self {
            DomainError::Multiple(errors) => errors.iter().flat_map(DomainError::leaves).collect(),
            other => vec![other],
        }
    }
}

/// Combines errors from concurrent branches.
///
/// Nested joins are flattened. No errors gives `None` and a single error is
/// returned as is.
pub fn join_errors<I>(errors: I) -> Option<DomainError>
where
    I: IntoIterator<Item = DomainError>,
{
    let mut flat = Vec::new();
    for error in errors {
        match error {
            DomainError::Multiple(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    match flat.len() {
        0 => None,
        1 => flat.pop(),
        _ => Some(DomainError::Multiple(flat)),
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
