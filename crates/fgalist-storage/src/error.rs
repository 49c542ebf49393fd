//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Store not found.
    #[error("store not found: {store_id}")]
    StoreNotFound { store_id: String },

    /// Store already exists.
    #[error("store already exists: {store_id}")]
    StoreAlreadyExists { store_id: String },

    /// Tuple exists with a different condition. Conditions on existing
    /// tuples are never updated in place; delete and re-create instead.
    #[error("tuple {tuple} exists with condition {existing:?}, not {requested:?}")]
    ConditionConflict {
        tuple: String,
        existing: Option<String>,
        requested: Option<String>,
    },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
