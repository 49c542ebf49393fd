//! Dispatch throttling.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Delays dispatches once a query has issued too many of them.
#[async_trait]
pub trait Throttler: Send + Sync {
    /// Waits for the caller's turn. Returns early if `cancel` fires.
    async fn throttle(&self, cancel: &CancellationToken);
}

/// Whether the dispatch numbered `dispatch_count` must be throttled.
///
/// A non-zero `requested` threshold replaces `threshold` but is capped at
/// `max_threshold`, which itself defaults to `threshold` when 0.
pub fn should_throttle(
    dispatch_count: u32,
    threshold: u32,
    max_threshold: u32,
    requested: u32,
) -> bool {
    let max_threshold = if max_threshold == 0 {
        threshold
    } else {
        max_threshold
    };
    let threshold = if requested > 0 {
        requested.min(max_threshold)
    } else {
        threshold
    };
    dispatch_count > threshold
}

/// Releases one waiting dispatch per tick.
///
/// The ticker is created on first use so the throttler can be built outside
/// a runtime.
#[derive(Debug)]
pub struct ConstantRateThrottler {
    frequency: Duration,
    ticker: Mutex<Option<Interval>>,
}

impl ConstantRateThrottler {
    pub fn new(frequency: Duration) -> Self {
        Self {
            frequency: frequency.max(Duration::from_nanos(1)),
            ticker: Mutex::new(None),
        }
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }
}

#[async_trait]
impl Throttler for ConstantRateThrottler {
    async fn throttle(&self, cancel: &CancellationToken) {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            mut ticker = self.ticker.lock() => {
                let interval = ticker.get_or_insert_with(|| {
                    let mut interval = tokio::time::interval(self.frequency);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    interval
                });
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = interval.tick() => {}
                }
            }
        }
    }
}
