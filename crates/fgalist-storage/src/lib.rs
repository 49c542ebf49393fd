//! fgalist-storage: Relationship tuple storage
//!
//! This crate provides the tuple storage used to answer ListUsers queries:
//! - DataStore trait for store and tuple operations
//! - In-memory implementation backed by `dashmap`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              fgalist-storage                 │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - DataStore trait definition   │
//! │  memory.rs   - In-memory implementation     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDataStore;
pub use traits::{DataStore, Store, StoredTuple, TupleFilter};
