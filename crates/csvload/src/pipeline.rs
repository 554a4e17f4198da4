//! Load pipeline
//!
//! One producer reads the source, reorders each record into a job and sends
//! it down a shared channel; a fixed pool of workers inserts the jobs. The
//! run ends when the source is exhausted and every dispatched job has been
//! inserted.

use async_channel::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::LoaderConfig;
use crate::error::{LoadError, Result};
use crate::executor::{InsertExecutor, InsertStatement};
use crate::header::{normalize_columns, Header};
use crate::pool::{WorkerPool, WorkerStats};
use crate::reorder::{FieldMap, Job};
use crate::sink::RowSink;
use crate::source::RowSource;
use crate::tracker::CompletionTracker;

/// Summary of a finished run
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Jobs handed to the worker pool
    pub dispatched: u64,
    pub inserted: u64,
    /// Records rejected by the reorderer
    pub skipped: u64,
    pub failed_attempts: u64,
    /// Read error that ended dispatch early, if any
    pub source_error: Option<String>,
    pub workers: Vec<WorkerStats>,
    pub elapsed: Duration,
}

/// Whole seconds, rounded up, as reported in the final `Done in` line
pub fn secs_ceil(elapsed: Duration) -> u64 {
    elapsed.as_secs_f64().ceil() as u64
}

#[derive(Debug, Default)]
struct Dispatched {
    dispatched: u64,
    skipped: u64,
    source_error: Option<String>,
}

/// Channel between the producer and the pool; capacity 0 means unbounded
pub fn job_channel(capacity: usize) -> (Sender<Job>, Receiver<Job>) {
    if capacity == 0 {
        async_channel::unbounded()
    } else {
        async_channel::bounded(capacity)
    }
}

/// Load every data record of `source` into `sink`.
///
/// Errors are startup errors only: bad configuration, an unreadable or empty
/// header, or configured columns missing from the file. Once jobs flow, the
/// call returns only after all of them are inserted.
pub async fn run<R, S>(mut source: R, sink: Arc<S>, config: &LoaderConfig) -> Result<LoadReport>
where
    R: RowSource,
    S: RowSink,
{
    config.validate()?;
    let started = Instant::now();

    info!("Reading header");
    let file_columns = source
        .next_record()
        .await?
        .map(normalize_columns)
        .ok_or(LoadError::EmptyInput)?;

    let header = Arc::new(Header::new(
        config
            .columns
            .clone()
            .map(normalize_columns)
            .unwrap_or_else(|| file_columns.clone()),
    )?);
    let field_map = FieldMap::resolve(header.clone(), &file_columns)?;
    if !field_map.is_identity() {
        info!(columns = ?header.columns(), "Mapping file columns into target order");
    }

    let statement = InsertStatement::build(&config.table, &header, &*sink);
    info!(sql = statement.sql(), "Prepared insert statement");

    let executor = Arc::new(InsertExecutor::new(sink, statement, config.retry_delay()));
    let tracker = Arc::new(CompletionTracker::new());
    let (jobs, queue) = job_channel(config.queue_capacity);

    let pool = WorkerPool::spawn(
        config.workers,
        queue,
        executor,
        tracker.clone(),
        config.progress_every,
    );

    info!("Reading records");
    let dispatched = dispatch(&mut source, &field_map, &jobs, &tracker).await;
    jobs.close();
    drop(jobs);

    info!(dispatched = dispatched.dispatched, "All records dispatched, waiting for workers");
    tracker.wait().await;
    let workers = pool.join().await?;

    let report = LoadReport {
        dispatched: dispatched.dispatched,
        inserted: workers.iter().map(|w| w.inserted).sum(),
        skipped: dispatched.skipped,
        failed_attempts: workers.iter().map(|w| w.failed_attempts).sum(),
        source_error: dispatched.source_error,
        workers,
        elapsed: started.elapsed(),
    };

    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        failed_attempts = report.failed_attempts,
        "Load finished"
    );
    Ok(report)
}

/// Producer loop. The pending count is raised before each send so a worker
/// can never complete a job the tracker has not seen yet.
async fn dispatch<R: RowSource>(
    source: &mut R,
    field_map: &FieldMap,
    jobs: &Sender<Job>,
    tracker: &CompletionTracker,
) -> Dispatched {
    let mut summary = Dispatched::default();
    let mut seq = 0u64;

    loop {
        let record = match source.next_record().await {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, after = seq, "Row source failed, no further records will be read");
                summary.source_error = Some(e.to_string());
                break;
            }
        };
        seq += 1;

        let job = match field_map.reorder(seq, record) {
            Ok(job) => job,
            Err(e) => {
                warn!(seq, error = %e, "Skipping malformed record");
                summary.skipped += 1;
                continue;
            }
        };

        tracker.add(1);
        if jobs.send(job).await.is_err() {
            let _ = tracker.rollback(1);
            error!(seq, "Job channel closed, stopping dispatch");
            break;
        }
        summary.dispatched += 1;
    }

    summary
}
