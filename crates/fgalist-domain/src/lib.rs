//! fgalist-domain: Authorization model and ListUsers resolution
//!
//! This crate answers "which subjects hold relation R on object O":
//! - Authorization model types and a cached type system
//! - CEL condition evaluation for conditional tuples
//! - The ListUsers expansion engine over a pluggable tuple reader
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               fgalist-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  model/     - Model types & type system     │
//! │  cel/       - Condition evaluation          │
//! │  listusers/ - ListUsers expansion engine    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cel;
pub mod error;
pub mod listusers;
pub mod model;

// Re-export commonly used types at the crate root
pub use error::{DomainError, DomainResult};
pub use listusers::{ListUsersConfig, ListUsersQuery, ListUsersRequest, ListUsersResponse};
