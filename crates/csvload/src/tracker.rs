//! Completion tracking for dispatched jobs
//!
//! The producer calls [`CompletionTracker::add`] before each job is sent,
//! workers call [`CompletionTracker::done`] after each successful insert, and
//! the main flow parks on [`CompletionTracker::wait`] once the producer has
//! closed the job channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerError {
    #[error("completion reported with no pending jobs")]
    Underflow,
}

#[derive(Debug, Default)]
pub struct CompletionTracker {
    pending: AtomicUsize,
    drained: Notify,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        self.pending.fetch_add(n, Ordering::AcqRel);
    }

    /// Mark one job as inserted, returning the remaining count
    pub fn done(&self) -> Result<usize, TrackerError> {
        self.sub(1)
    }

    /// Undo an `add` whose job never reached the channel
    pub fn rollback(&self, n: usize) -> Result<usize, TrackerError> {
        self.sub(n)
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Resolve once the pending count is zero.
    ///
    /// Only meaningful after the producer has finished adding: before that,
    /// workers can briefly drain the count to zero between two records.
    pub async fn wait(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // register before checking so a concurrent drain cannot be missed
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn sub(&self, n: usize) -> Result<usize, TrackerError> {
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| p.checked_sub(n))
            .map_err(|_| TrackerError::Underflow)?;

        let remaining = previous - n;
        if remaining == 0 {
            self.drained.notify_waiters();
        }
        Ok(remaining)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_add_and_done() {
        let tracker = CompletionTracker::new();
        tracker.add(1);
        tracker.add(2);
        assert_eq!(tracker.pending(), 3);
        assert_eq!(tracker.done().unwrap(), 2);
        assert_eq!(tracker.rollback(2).unwrap(), 0);
    }

    #[test]
    fn test_done_never_goes_negative() {
        let tracker = CompletionTracker::new();
        assert_eq!(tracker.done(), Err(TrackerError::Underflow));
        assert_eq!(tracker.pending(), 0);

        tracker.add(1);
        assert_eq!(tracker.rollback(2), Err(TrackerError::Underflow));
        assert_eq!(tracker.pending(), 1);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_idle() {
        let tracker = CompletionTracker::new();
        tokio::time::timeout(Duration::from_secs(1), tracker.wait())
            .await
            .expect("wait should not block with nothing pending");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_blocks_until_last_done() {
        let tracker = Arc::new(CompletionTracker::new());
        tracker.add(3);

        let worker = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                for _ in 0..3 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    tracker.done().unwrap();
                }
            })
        };

        let started = tokio::time::Instant::now();
        tracker.wait().await;
        assert_eq!(tracker.pending(), 0);
        assert!(started.elapsed() >= Duration::from_millis(30));
        worker.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_done_reaches_zero_exactly_once() {
        let tracker = Arc::new(CompletionTracker::new());
        let jobs = 1000;
        tracker.add(jobs);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move {
                    let mut zeros = 0;
                    for _ in 0..jobs / 8 {
                        if tracker.done().unwrap() == 0 {
                            zeros += 1;
                        }
                    }
                    zeros
                })
            })
            .collect();

        tracker.wait().await;
        let mut zeros = 0;
        for handle in handles {
            zeros += handle.await.unwrap();
        }
        assert_eq!(zeros, 1);
        assert_eq!(tracker.done(), Err(TrackerError::Underflow));
    }
}
