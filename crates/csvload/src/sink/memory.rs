//! In-memory sink used for dry runs

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{RowSink, SinkError, SinkTransaction};

/// A committed insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedRow {
    pub statement: String,
    pub values: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<InsertedRow>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of committed rows in commit order
    pub fn rows(&self) -> Vec<InsertedRow> {
        lock(&self.rows).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RowSink for MemorySink {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, SinkError> {
        Ok(MemoryTransaction {
            rows: self.rows.clone(),
            staged: Vec::new(),
        })
    }
}

/// Buffers executed rows until commit; dropping it discards them
#[derive(Debug)]
pub struct MemoryTransaction {
    rows: Arc<Mutex<Vec<InsertedRow>>>,
    staged: Vec<InsertedRow>,
}

#[async_trait]
impl SinkTransaction for MemoryTransaction {
    async fn execute(&mut self, statement: &str, values: &[String]) -> Result<(), SinkError> {
        self.staged.push(InsertedRow {
            statement: statement.to_string(),
            values: values.to_vec(),
        });
        Ok(())
    }

    async fn commit(self) -> Result<(), SinkError> {
        lock(&self.rows).extend(self.staged);
        Ok(())
    }
}

// A panic while holding the lock cannot leave a half-written Vec behind.
fn lock(rows: &Mutex<Vec<InsertedRow>>) -> MutexGuard<'_, Vec<InsertedRow>> {
    rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
