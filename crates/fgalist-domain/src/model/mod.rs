//! Authorization model types and the cached type system.

mod type_system;
mod types;
#[cfg(test)]
mod types_proptest;

pub use type_system::TypeSystem;
pub use types::*;
