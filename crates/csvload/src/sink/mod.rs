//! Row sinks
//!
//! A sink hands out transactions. Dropping a transaction without committing
//! it must discard everything executed in it, which is how failed insert
//! attempts are rolled back.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::{InsertedRow, MemorySink, MemoryTransaction};
pub use postgres::PgRowSink;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Table '{0}' not found. Create it before loading.")]
    UnknownTable(String),

    /// Failure raised by a non-database sink
    #[error("{0}")]
    Rejected(String),
}

#[async_trait]
pub trait SinkTransaction: Send {
    async fn execute(&mut self, statement: &str, values: &[String]) -> Result<(), SinkError>;

    async fn commit(self) -> Result<(), SinkError>;
}

/// Destination store accepting transactional inserts
#[async_trait]
pub trait RowSink: Send + Sync + 'static {
    type Transaction: SinkTransaction;

    async fn begin(&self) -> Result<Self::Transaction, SinkError>;

    /// Placeholder text for the value bound at 1-based `position`
    fn placeholder(&self, position: usize, _column: &str) -> String {
        format!("${}", position)
    }
}
