//! csvload
//!
//! Bulk-loads a delimited text file into a database table with a fixed pool
//! of concurrent workers. Each row is inserted in its own transaction and
//! retried after a fixed delay until it succeeds.
//!
//! ```text
//! RowSource -> FieldMap -> job channel -> WorkerPool -> InsertExecutor -> RowSink
//!                               |                           |
//!                               +---- CompletionTracker ----+
//! ```
//!
//! # Example
//!
//! ```no_run
//! use csvload::config::LoaderConfig;
//! use csvload::sink::MemorySink;
//! use csvload::source::CsvRowSource;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LoaderConfig::default();
//!     let source = CsvRowSource::open(&config.file, b',').await?;
//!     let sink = Arc::new(MemorySink::new());
//!
//!     let report = csvload::pipeline::run(source, sink, &config).await?;
//!     println!("inserted {} rows", report.inserted);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod header;
pub mod pipeline;
pub mod pool;
pub mod reorder;
pub mod sink;
pub mod source;
pub mod tracker;

// Re-export commonly used types
pub use error::{LoadError, Result};
pub use pipeline::{run, LoadReport};
