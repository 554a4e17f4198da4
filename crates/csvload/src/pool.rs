//! Fixed-size worker pool
//!
//! Workers share one receiving end of the job channel. Each one inserts the
//! job it pulled (retrying as long as it takes) before pulling the next, so a
//! pool of N workers never has more than N transactions open.

use async_channel::Receiver;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::{LoadError, Result};
use crate::executor::InsertExecutor;
use crate::reorder::Job;
use crate::sink::RowSink;
use crate::tracker::CompletionTracker;

/// Per-worker counters, returned when the worker exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub worker: usize,
    pub inserted: u64,
    pub failed_attempts: u64,
}

pub struct WorkerPool {
    workers: JoinSet<WorkerStats>,
    size: usize,
}

impl WorkerPool {
    /// Start `size` workers pulling from `jobs`.
    ///
    /// `progress_every` controls the per-worker progress line; 0 disables it.
    pub fn spawn<S: RowSink>(
        size: usize,
        jobs: Receiver<Job>,
        executor: Arc<InsertExecutor<S>>,
        tracker: Arc<CompletionTracker>,
        progress_every: u64,
    ) -> Self {
        info!(workers = size, "Dispatching workers");

        let mut workers = JoinSet::new();
        for worker in 0..size {
            workers.spawn(run_worker(
                worker,
                jobs.clone(),
                executor.clone(),
                tracker.clone(),
                progress_every,
            ));
        }

        Self { workers, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for every worker to exit; they do so once the channel is closed
    /// and empty. Stats come back ordered by worker index.
    pub async fn join(mut self) -> Result<Vec<WorkerStats>> {
        let mut stats = Vec::with_capacity(self.size);
        while let Some(joined) = self.workers.join_next().await {
            let worker = joined.map_err(|e| LoadError::Worker(e.to_string()))?;
            stats.push(worker);
        }
        stats.sort_by_key(|s| s.worker);
        Ok(stats)
    }
}

async fn run_worker<S: RowSink>(
    worker: usize,
    jobs: Receiver<Job>,
    executor: Arc<InsertExecutor<S>>,
    tracker: Arc<CompletionTracker>,
    progress_every: u64,
) -> WorkerStats {
    debug!(worker, "Worker started");

    let mut stats = WorkerStats {
        worker,
        ..Default::default()
    };

    while let Ok(job) = jobs.recv().await {
        let outcome = executor.insert(worker, &job).await;

        if let Err(e) = tracker.done() {
            error!(worker, seq = job.seq(), error = %e, "Completion count out of step");
        }

        stats.inserted += 1;
        stats.failed_attempts += u64::from(outcome.failed_attempts());

        if progress_every > 0 && stats.inserted % progress_every == 0 {
            info!(worker, inserted = stats.inserted, "Worker progress");
        }
    }

    debug!(
        worker,
        inserted = stats.inserted,
        failed_attempts = stats.failed_attempts,
        "Worker finished"
    );
    stats
}
