use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Eq, PartialEq)]
pub enum SchedulerError {
    #[error("Scheduler has been shut down")]
    ShutDown,

    #[error("Scheduler is already running {0} tasks, its maximum")]
    Saturated(usize),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Fixed-capacity task scheduler.
///
/// Each submitted task holds one of `capacity` slots for as long as it runs: a submission
/// that finds no free slot is rejected, never queued.
/// Every task receives a child of the scheduler [`CancellationToken`]: [`Self::shutdown_now`]
/// cancels them all at once, and no further task is accepted afterwards.
pub struct Scheduler {
    capacity: usize,
    slots: Arc<Semaphore>,
    shutdown_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(capacity: usize) -> Self {
        debug!("Created scheduler with {capacity} slots");
        Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            shutdown_token: CancellationToken::new(),
            tasks: Vec::with_capacity(capacity),
        }
    }

    /// Number of tasks currently holding a slot.
    pub fn active(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Spawn the future built by `task`, if a slot is available.
    ///
    /// `task` is given the [`CancellationToken`] that the future is expected to honour.
    pub fn submit<F, Fut>(&mut self, task: F) -> SchedulerResult<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutdown() {
            return Err(SchedulerError::ShutDown);
        }

        let slot = self
            .slots
            .clone()
            .try_acquire_owned()
            .map_err(|_| SchedulerError::Saturated(self.capacity))?;

        let fut = task(self.shutdown_token.child_token());
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(tokio::spawn(async move {
            fut.await;
            drop(slot);
        }));

        Ok(())
    }

    /// Cancel every task and reject any further submission.
    pub fn shutdown_now(&self) {
        if !self.is_shutdown() {
            debug!("Shutting down scheduler with {} active tasks", self.active());
        }
        self.shutdown_token.cancel();
    }

    /// Wait up to `grace_period` for every task to terminate.
    ///
    /// Tasks still alive once the grace period expires are aborted at their next
    /// suspension point. Returns `true` only if all tasks terminated on their own.
    pub async fn await_termination(&mut self, grace_period: Duration) -> bool {
        let tasks: Vec<JoinHandle<()>> = self.tasks.drain(..).collect();
        let aborts: Vec<_> = tasks.iter().map(|t| t.abort_handle()).collect();

        let all_joined = async move {
            for t in tasks {
                if let Err(e) = t.await {
                    if e.is_panic() {
                        error!("Scheduled task panicked: {e}");
                    }
                }
            }
        };

        match timeout(grace_period, all_joined).await {
            Ok(()) => true,
            Err(_) => {
                for a in aborts {
                    a.abort();
                }
                false
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{Scheduler, SchedulerError};
    use crate::broker::testing::eventually;

    #[tokio::test]
    async fn test_rejects_beyond_capacity() {
        let mut scheduler = Scheduler::new(2);

        for _ in 0..2 {
            scheduler.submit(|token| async move { token.cancelled().await }).unwrap();
        }
        assert_eq!(scheduler.active(), 2);
        assert_eq!(
            scheduler.submit(|token| async move { token.cancelled().await }),
            Err(SchedulerError::Saturated(2))
        );

        scheduler.shutdown_now();
        assert!(scheduler.await_termination(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_slot_released_when_task_ends() {
        let mut scheduler = Scheduler::new(1);

        scheduler.submit(|_| async {}).unwrap();
        assert!(eventually(|| scheduler.active() == 0).await);
        scheduler.submit(|_| async {}).unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_and_rejects() {
        let mut scheduler = Scheduler::new(3);
        let cancelled = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let c = cancelled.clone();
            scheduler
                .submit(move |token| async move {
                    token.cancelled().await;
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        scheduler.shutdown_now();
        assert!(scheduler.is_shutdown());
        assert!(scheduler.await_termination(Duration::from_secs(1)).await);
        assert_eq!(cancelled.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.submit(|_| async {}), Err(SchedulerError::ShutDown));
    }

    #[tokio::test]
    async fn test_await_termination_aborts_stragglers() {
        let mut scheduler = Scheduler::new(1);

        // Ignores cancellation
        scheduler.submit(|_| tokio::time::sleep(Duration::from_secs(3600))).unwrap();

        scheduler.shutdown_now();
        assert!(!scheduler.await_termination(Duration::from_millis(50)).await);
        assert!(eventually(|| scheduler.active() == 0).await);
    }
}
