//! fgalist-cli: Runs ListUsers queries from the command line
//!
//! This crate wires the domain engine to a storage backend:
//! - Configuration management
//! - Logging initialisation
//! - DataStore to TupleReader adapter
//! - Model and tuple fixtures
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                fgalist-cli                   │
//! ├─────────────────────────────────────────────┤
//! │  config.rs        - Configuration loading   │
//! │  observability.rs - Logging setup           │
//! │  adapters.rs      - Storage adapter         │
//! │  fixtures.rs      - Fixture loading         │
//! │  runner.rs        - Query runner            │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod fixtures;
pub mod observability;
pub mod runner;

// Re-exports for convenience
pub use config::{AppConfig, ConfigLoadError};
pub use fixtures::{Fixture, FixtureError};
pub use runner::{Runner, RunnerError};
