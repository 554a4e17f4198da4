//! Insert execution with retry
//!
//! Each job goes through a two-state loop:
//!
//! ```text
//! ATTEMPT --ok--> DONE
//!    |
//!   err
//!    v
//!  WAIT (fixed delay) --> ATTEMPT
//! ```
//!
//! There is no attempt limit. A row that can never be inserted keeps its
//! worker busy until the process is stopped.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::header::Header;
use crate::reorder::Job;
use crate::sink::{RowSink, SinkError, SinkTransaction};

/// Default pause between two attempts of the same job
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("insert attempt panicked: {0}")]
    Panicked(String),
}

/// `INSERT INTO table (c1,...,cn) VALUES (p1,...,pn)`, rendered once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    sql: String,
    columns: usize,
}

impl InsertStatement {
    /// `table` and the header columns must already be valid identifiers
    pub fn build<S: RowSink + ?Sized>(table: &str, header: &Header, sink: &S) -> Self {
        let placeholders = header
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| sink.placeholder(i + 1, column))
            .collect::<Vec<_>>();

        Self {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                header.columns().join(","),
                placeholders.join(",")
            ),
            columns: header.len(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn columns(&self) -> usize {
        self.columns
    }
}

/// Outcome of [`InsertExecutor::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    /// Attempts made, including the successful one
    pub attempts: u32,
}

impl Inserted {
    pub fn failed_attempts(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

pub struct InsertExecutor<S> {
    sink: Arc<S>,
    statement: InsertStatement,
    retry_delay: Duration,
}

impl<S: RowSink> InsertExecutor<S> {
    pub fn new(sink: Arc<S>, statement: InsertStatement, retry_delay: Duration) -> Self {
        Self {
            sink,
            statement,
            retry_delay,
        }
    }

    pub fn statement(&self) -> &InsertStatement {
        &self.statement
    }

    /// Insert `job`, retrying until it commits
    pub async fn insert(&self, worker: usize, job: &Job) -> Inserted {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.attempt(job).await {
                Ok(()) => return Inserted { attempts },
                Err(error) => {
                    warn!(
                        worker,
                        seq = job.seq(),
                        attempt = attempts,
                        error = %error,
                        "Insert failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// One transaction: begin, execute, commit.
    ///
    /// An error at any step drops the open transaction, which rolls it back.
    /// A panic inside the sink is caught here and reported as an error.
    pub async fn attempt(&self, job: &Job) -> Result<(), AttemptError> {
        let attempt = async {
            let mut tx = self.sink.begin().await?;
            tx.execute(self.statement.sql(), job.values()).await?;
            tx.commit().await
        };

        match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(result) => result.map_err(AttemptError::from),
            Err(payload) => Err(AttemptError::Panicked(panic_message(&*payload))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
