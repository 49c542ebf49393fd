//! Configuration for ListUsers resolution.

use std::time::Duration;

use crate::error::{DomainError, DomainResult};

/// Limits and timing for a ListUsers query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUsersConfig {
    /// Maximum recursion depth (matches OpenFGA default of 25).
    pub resolve_node_limit: u32,
    /// Concurrent sub-expansions per fan-out point.
    pub resolve_node_breadth_limit: u32,
    /// Time budget for a query; `None` disables the deadline.
    pub deadline: Option<Duration>,
    /// Maximum users returned; 0 means unlimited.
    pub max_results: u32,
    /// Storage reads in flight per query.
    pub max_concurrent_reads: u32,
    pub dispatch_throttling: DispatchThrottlingConfig,
}

impl Default for ListUsersConfig {
    fn default() -> Self {
        Self {
            resolve_node_limit: 25,
            resolve_node_breadth_limit: 10,
            deadline: Some(Duration::from_secs(3)),
            max_results: 1000,
            max_concurrent_reads: u32::MAX,
            dispatch_throttling: DispatchThrottlingConfig::default(),
        }
    }
}

impl ListUsersConfig {
    pub fn with_resolve_node_limit(mut self, limit: u32) -> Self {
        self.resolve_node_limit = limit;
        self
    }

    pub fn with_resolve_node_breadth_limit(mut self, limit: u32) -> Self {
        self.resolve_node_breadth_limit = limit;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_max_concurrent_reads(mut self, max_concurrent_reads: u32) -> Self {
        self.max_concurrent_reads = max_concurrent_reads;
        self
    }

    pub fn with_dispatch_throttling(mut self, throttling: DispatchThrottlingConfig) -> Self {
        self.dispatch_throttling = throttling;
        self
    }

    /// Checks that the limits can drive a query.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` for zero node, breadth or read
    /// limits and for a throttling threshold above a non-zero maximum.
    pub fn validate(&self) -> DomainResult<()> {
        if self.resolve_node_limit == 0 {
            return Err(configuration("resolve_node_limit must be greater than 0"));
        }
        if self.resolve_node_breadth_limit == 0 {
            return Err(configuration(
                "resolve_node_breadth_limit must be greater than 0",
            ));
        }
        if self.max_concurrent_reads == 0 {
            return Err(configuration("max_concurrent_reads must be greater than 0"));
        }
        self.dispatch_throttling.validate()
    }
}

/// Dispatch throttling settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchThrottlingConfig {
    pub enabled: bool,
    /// Interval at which the throttler releases one waiting dispatch.
    pub frequency: Duration,
    /// Dispatch count above which dispatches are throttled.
    pub threshold: u32,
    /// Upper bound for per-request thresholds; 0 means `threshold`.
    pub max_threshold: u32,
}

impl Default for DispatchThrottlingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: Duration::from_micros(10),
            threshold: 100,
            max_threshold: 0,
        }
    }
}

impl DispatchThrottlingConfig {
    /// Enabled throttling with the given threshold and default frequency.
    pub fn enabled(threshold: u32) -> Self {
        Self {
            enabled: true,
            threshold,
            ..Self::default()
        }
    }

    pub fn with_frequency(mut self, frequency: Duration) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_max_threshold(mut self, max_threshold: u32) -> Self {
        self.max_threshold = max_threshold;
        self
    }

    /// The effective upper bound for per-request thresholds.
    pub fn effective_max_threshold(&self) -> u32 {
        if self.max_threshold == 0 {
            self.threshold
        } else {
            self.max_threshold
        }
    }

    fn validate(&self) -> DomainResult<()> {
        if self.max_threshold != 0 && self.threshold > self.max_threshold {
            return Err(configuration(format!(
                "dispatch throttling threshold ({}) must not exceed max_threshold ({})",
                self.threshold, self.max_threshold
            )));
        }
        if self.enabled && self.frequency.is_zero() {
            return Err(configuration("dispatch throttling frequency must be non-zero"));
        }
        Ok(())
    }
}

fn configuration(message: impl Into<String>) -> DomainError {
    DomainError::Configuration {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_reference_server() {
        let config = ListUsersConfig::default();
        assert_eq!(config.resolve_node_limit, 25);
        assert_eq!(config.resolve_node_breadth_limit, 10);
        assert_eq!(config.deadline, Some(Duration::from_secs(3)));
        assert_eq!(config.max_results, 1000);
        assert_eq!(config.max_concurrent_reads, u32::MAX);
        assert!(!config.dispatch_throttling.enabled);
        assert_eq!(config.dispatch_throttling.frequency, Duration::from_micros(10));
        assert_eq!(config.dispatch_throttling.threshold, 100);
        assert_eq!(config.dispatch_throttling.max_threshold, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        assert!(ListUsersConfig::default()
            .with_resolve_node_limit(0)
            .validate()
            .is_err());
        assert!(ListUsersConfig::default()
            .with_resolve_node_breadth_limit(0)
            .validate()
            .is_err());
        assert!(ListUsersConfig::default()
            .with_max_concurrent_reads(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_threshold_above_max_threshold_is_rejected() {
        let config = ListUsersConfig::default().with_dispatch_throttling(
            DispatchThrottlingConfig::enabled(200).with_max_threshold(100),
        );
        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration { .. })
        ));
    }

    #[test]
    fn test_zero_max_threshold_means_threshold() {
        let throttling = DispatchThrottlingConfig::enabled(50);
        assert_eq!(throttling.effective_max_threshold(), 50);
        assert_eq!(
            throttling.with_max_threshold(80).effective_max_threshold(),
            80
        );
    }
}
