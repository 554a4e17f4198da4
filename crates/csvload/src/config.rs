//! Loader configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LoadError, Result};
use crate::header::{is_identifier, validate_table_name};

// ============================================================================
// Loader Configuration Constants
// ============================================================================

/// Default input file.
pub const DEFAULT_CSV_FILE: &str = "majestic_million.csv";

/// Default target table.
pub const DEFAULT_TABLE: &str = "domain";

/// Default number of insert workers.
pub const DEFAULT_WORKERS: usize = 100;

/// Default job channel capacity (0 means unbounded).
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// Default delay between attempts of a failing insert, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Default progress interval, in inserted rows per worker.
pub const DEFAULT_PROGRESS_EVERY: u64 = 100;

/// Default field delimiter.
pub const DEFAULT_DELIMITER: char = ',';

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub file: PathBuf,
    /// Target table, optionally schema qualified
    pub table: String,
    pub workers: usize,
    pub queue_capacity: usize,
    pub retry_delay_ms: u64,
    pub progress_every: u64,
    /// Explicit target columns; `None` loads every column of the file header
    pub columns: Option<Vec<String>>,
    pub delimiter: char,
    pub dry_run: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_CSV_FILE),
            table: DEFAULT_TABLE.to_string(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            progress_every: DEFAULT_PROGRESS_EVERY,
            columns: None,
            delimiter: DEFAULT_DELIMITER,
            dry_run: false,
        }
    }
}

impl LoaderConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                LoadError::config(format!("delimiter {:?} must be a single ASCII character", self.delimiter))
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(LoadError::config("workers must be greater than 0"));
        }

        validate_table_name(&self.table)
            .map_err(|e| LoadError::config(format!("table name: {}", e)))?;

        self.delimiter_byte()?;

        if let Some(ref columns) = self.columns {
            if columns.is_empty() {
                return Err(LoadError::config("column list is empty"));
            }
            // surrounding whitespace is trimmed before the header is built
            if let Some(bad) = columns.iter().find(|c| !is_identifier(c.trim())) {
                return Err(LoadError::config(format!("column '{}' is not a valid identifier", bad)));
            }
        }

        Ok(())
    }

    /// Warn when more workers than pooled connections will be contending.
    ///
    /// Surplus workers wait for a connection inside `begin`; if they wait past
    /// the pool's acquire timeout the attempt fails and is retried.
    pub fn check_pool_sizing(&self, max_connections: u32) {
        if self.workers > max_connections as usize {
            tracing::warn!(
                workers = self.workers,
                max_connections,
                "More workers than database connections, surplus workers will queue for a connection"
            );
        }
    }
}
