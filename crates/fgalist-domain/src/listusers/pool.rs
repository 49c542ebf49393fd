//! Bounded task pool for fan-out points.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::{join_errors, DomainError, DomainResult};

/// Runs at most `limit` tasks at once and joins all of their errors.
///
/// Each Direct, TupleToUserset, Union and Intersection evaluation owns one
/// pool, so the total concurrency of a query is the product of the limits
/// along the active path.
pub(crate) struct BoundedPool {
    tasks: JoinSet<DomainResult<()>>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    errors: Vec<DomainError>,
}

impl BoundedPool {
    pub(crate) fn new(limit: u32, cancel: CancellationToken) -> Self {
        let permits = usize::try_from(limit)
            .unwrap_or(usize::MAX)
            .clamp(1, Semaphore::MAX_PERMITS);
        Self {
            tasks: JoinSet::new(),
            permits: Arc::new(Semaphore::new(permits)),
            cancel,
            errors: Vec::new(),
        }
    }

    /// Waits for a free slot, then starts `task`.
    ///
    /// If the query is cancelled while waiting the task is dropped and a
    /// `Cancelled` error is recorded instead.
    pub(crate) async fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = DomainResult<()>> + Send + 'static,
    {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.errors.push(DomainError::Cancelled);
                return;
            }
            permit = Arc::clone(&self.permits).acquire_owned() => permit,
        };

        match permit {
            Ok(permit) => {
                self.tasks.spawn(async move {
                    let _permit = permit;
                    task.await
                });
            }
            Err(_) => self.errors.push(DomainError::Cancelled),
        }
    }

    /// Waits for every task and joins their errors.
    pub(crate) async fn wait(mut self) -> Option<DomainError> {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.errors.push(e),
                Err(e) => self.errors.push(task_failure(e)),
            }
        }
        join_errors(self.errors)
    }
}

/// Converts a failed join into a domain error, keeping the panic message.
pub(crate) fn task_failure(error: JoinError) -> DomainError {
    if error.is_panic() {
        DomainError::TaskPanicked {
            message: panic_message(error.into_panic()),
        }
    } else {
        DomainError::Cancelled
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let mut pool = BoundedPool::new(2, CancellationToken::new());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        }

        assert!(pool.wait().await.is_none());
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_pool_joins_every_error() {
        let mut pool = BoundedPool::new(4, CancellationToken::new());
        for i in 0..3 {
            pool.spawn(async move {
                Err(DomainError::Storage {
                    message: format!("read {i} failed"),
                })
            })
            .await;
        }

        match pool.wait().await {
            Some(DomainError::Multiple(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected three joined errors, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panicking_task_becomes_error() {
        let mut pool = BoundedPool::new(1, CancellationToken::new());
        let explode = true;
        pool.spawn(async move {
            if explode {
                panic!("boom in task");
            }
            Ok(())
        })
        .await;

        match pool.wait().await {
            Some(DomainError::TaskPanicked { message }) => assert_eq!(message, "boom in task"),
            other => panic!("expected TaskPanicked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_after_cancel_records_cancellation() {
        let cancel = CancellationToken::new();
        let mut pool = BoundedPool::new(1, cancel.clone());
        cancel.cancel();
        pool.spawn(async { Ok(()) }).await;

        let err = pool.wait().await.unwrap();
        assert!(err.is_cancellation());
    }
}
