//! Shared fixtures for pipeline integration tests
//!
//! - [`FlakySink`]: fails the first K attempts at a chosen step
//! - [`GaugeSink`]: records the highest number of simultaneously open transactions
//! - [`FailingSource`]: yields some records, then a read error
//! - [`WarnCapture`]: tracing layer that keeps the fields of every WARN event

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use csvload::sink::{InsertedRow, MemorySink, MemoryTransaction, RowSink, SinkError, SinkTransaction};
use csvload::source::{RowSource, SourceError};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub fn record(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Fault injection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Begin,
    Execute,
    Commit,
}

pub struct FlakySink {
    inner: MemorySink,
    fail_at: FailAt,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakySink {
    pub fn new(fail_at: FailAt, failures: usize) -> Self {
        Self {
            inner: MemorySink::new(),
            fail_at,
            failures_left: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn rows(&self) -> Vec<InsertedRow> {
        self.inner.rows()
    }

    /// Number of transactions begun, failed or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn should_fail(&self, step: FailAt) -> bool {
        step == self.fail_at
            && self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
    }
}

#[async_trait]
impl RowSink for FlakySink {
    type Transaction = FlakyTransaction;

    async fn begin(&self) -> Result<FlakyTransaction, SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail(FailAt::Begin) {
            return Err(SinkError::Rejected("injected begin failure".to_string()));
        }

        Ok(FlakyTransaction {
            inner: self.inner.begin().await?,
            fail_execute: self.should_fail(FailAt::Execute),
            fail_commit: self.should_fail(FailAt::Commit),
        })
    }
}

pub struct FlakyTransaction {
    inner: MemoryTransaction,
    fail_execute: bool,
    fail_commit: bool,
}

#[async_trait]
impl SinkTransaction for FlakyTransaction {
    async fn execute(&mut self, statement: &str, values: &[String]) -> Result<(), SinkError> {
        // stage the row first so a lost rollback would show up as a duplicate
        self.inner.execute(statement, values).await?;
        if self.fail_execute {
            return Err(SinkError::Rejected("injected execute failure".to_string()));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), SinkError> {
        if self.fail_commit {
            return Err(SinkError::Rejected("injected commit failure".to_string()));
        }
        self.inner.commit().await
    }
}

// ============================================================================
// Concurrency gauge
// ============================================================================

pub struct GaugeSink {
    inner: MemorySink,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
    hold: Duration,
}

impl GaugeSink {
    /// Each transaction stays open for at least `hold`
    pub fn new(hold: Duration) -> Self {
        Self {
            inner: MemorySink::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: AtomicUsize::new(0),
            hold,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl RowSink for GaugeSink {
    type Transaction = GaugeTransaction;

    async fn begin(&self) -> Result<GaugeTransaction, SinkError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        Ok(GaugeTransaction {
            inner: self.inner.begin().await?,
            hold: self.hold,
            _open: OpenGuard(self.in_flight.clone()),
        })
    }
}

struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct GaugeTransaction {
    inner: MemoryTransaction,
    hold: Duration,
    _open: OpenGuard,
}

#[async_trait]
impl SinkTransaction for GaugeTransaction {
    async fn execute(&mut self, statement: &str, values: &[String]) -> Result<(), SinkError> {
        tokio::time::sleep(self.hold).await;
        self.inner.execute(statement, values).await
    }

    async fn commit(self) -> Result<(), SinkError> {
        self.inner.commit().await
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Yields `records` in order, then fails every call after that
pub struct FailingSource {
    records: VecDeque<Vec<String>>,
}

impl FailingSource {
    pub fn new(records: Vec<Vec<String>>) -> Self {
        Self {
            records: records.into(),
        }
    }
}

#[async_trait]
impl RowSource for FailingSource {
    async fn next_record(&mut self) -> Result<Option<Vec<String>>, SourceError> {
        match self.records.pop_front() {
            Some(record) => Ok(Some(record)),
            None => Err(SourceError::Other("disk read failed".to_string())),
        }
    }
}

// ============================================================================
// Log capture
// ============================================================================

pub type CapturedFields = BTreeMap<String, String>;

#[derive(Clone, Default)]
pub struct WarnCapture {
    events: Arc<Mutex<Vec<CapturedFields>>>,
}

impl WarnCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CapturedFields> {
        self.events.lock().unwrap().clone()
    }
}

impl<S: Subscriber> Layer<S> for WarnCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        self.events.lock().unwrap().push(fields.0);
    }
}

#[derive(Default)]
struct FieldCollector(CapturedFields);

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}
