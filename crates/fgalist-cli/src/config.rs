//! Configuration management for the fgalist runner.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use fgalist_cli::config::AppConfig;
//!
//! // Load from file with env overrides
//! let config = AppConfig::load("config.yaml")?;
//!
//! // Or load from environment only
//! let config = AppConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use fgalist_domain::listusers::{DispatchThrottlingConfig, ListUsersConfig};

/// Prefix of environment variable overrides.
const ENV_PREFIX: &str = "FGALIST";

/// Runner configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    /// ListUsers resolution settings
    #[serde(default)]
    pub listusers: ListUsersSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// ListUsers resolution settings.
///
/// Overridable with `FGALIST_LISTUSERS__<FIELD>`, for example
/// `FGALIST_LISTUSERS__MAX_RESULTS=50`.
///
/// # Example YAML Configuration
///
/// ```yaml
/// listusers:
///   resolve_node_limit: 25
///   resolve_node_breadth_limit: 10
///   deadline_ms: 3000
///   max_results: 1000
///   dispatch_throttling:
///     enabled: true
///     threshold: 100
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ListUsersSettings {
    /// Maximum recursion depth of one query.
    #[serde(default = "default_resolve_node_limit")]
    pub resolve_node_limit: u32,

    /// Concurrent sub-expansions per fan-out point.
    #[serde(default = "default_resolve_node_breadth_limit")]
    pub resolve_node_breadth_limit: u32,

    /// Query deadline in milliseconds; 0 disables the deadline.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    /// Result cap; 0 means unlimited.
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Concurrent datastore reads per query.
    #[serde(default = "default_max_concurrent_reads")]
    pub max_concurrent_reads: u32,

    #[serde(default)]
    pub dispatch_throttling: DispatchThrottlingSettings,
}

impl Default for ListUsersSettings {
    fn default() -> Self {
        Self {
            resolve_node_limit: default_resolve_node_limit(),
            resolve_node_breadth_limit: default_resolve_node_breadth_limit(),
            deadline_ms: default_deadline_ms(),
            max_results: default_max_results(),
            max_concurrent_reads: default_max_concurrent_reads(),
            dispatch_throttling: DispatchThrottlingSettings::default(),
        }
    }
}

fn default_resolve_node_limit() -> u32 {
    25
}

fn default_resolve_node_breadth_limit() -> u32 {
    10
}

fn default_deadline_ms() -> u64 {
    3000
}

fn default_max_results() -> u32 {
    1000
}

fn default_max_concurrent_reads() -> u32 {
    u32::MAX
}

impl ListUsersSettings {
    /// Builds the domain configuration.
    pub fn to_domain(&self) -> ListUsersConfig {
        let deadline = (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms));
        ListUsersConfig::default()
            .with_resolve_node_limit(self.resolve_node_limit)
            .with_resolve_node_breadth_limit(self.resolve_node_breadth_limit)
            .with_deadline(deadline)
            .with_max_results(self.max_results)
            .with_max_concurrent_reads(self.max_concurrent_reads)
            .with_dispatch_throttling(self.dispatch_throttling.to_domain())
    }
}

/// Dispatch throttling settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DispatchThrottlingSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Throttler tick in microseconds.
    #[serde(default = "default_throttling_frequency_us")]
    pub frequency_us: u64,

    #[serde(default = "default_throttling_threshold")]
    pub threshold: u32,

    /// Upper bound for per-request thresholds; 0 means `threshold`.
    #[serde(default)]
    pub max_threshold: u32,
}

impl Default for DispatchThrottlingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency_us: default_throttling_frequency_us(),
            threshold: default_throttling_threshold(),
            max_threshold: 0,
        }
    }
}

fn default_throttling_frequency_us() -> u64 {
    10
}

fn default_throttling_threshold() -> u32 {
    100
}

impl DispatchThrottlingSettings {
    fn to_domain(&self) -> DispatchThrottlingConfig {
        DispatchThrottlingConfig {
            enabled: self.enabled,
            frequency: Duration::from_micros(self.frequency_us),
            threshold: self.threshold,
            max_threshold: self.max_threshold,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl AppConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `FGALIST_` and use `__` as
    /// separator, e.g. `FGALIST_LOGGING__LEVEL=debug` overrides
    /// `logging.level`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        Self::build(Some(path))
    }

    /// Load configuration from defaults and environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::build(None)
    }

    fn build(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }
        let config = builder
            // FGALIST_LISTUSERS__MAX_RESULTS -> listusers.max_results
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        self.listusers
            .to_domain()
            .validate()
            .map_err(|e| ConfigLoadError::Invalid {
                message: format!("listusers: {e}"),
            })?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}
