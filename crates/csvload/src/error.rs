//! Error types for a load run
//!
//! Only startup failures surface here. Insert failures never do: the
//! executor retries them until they succeed.

use thiserror::Error;

use crate::header::HeaderError;
use crate::reorder::ReorderError;
use crate::source::SourceError;

/// Result type alias for load operations
pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Error, Debug)]
pub enum LoadError {
    /// The row source could not be opened or its header could not be read
    #[error("Row source error: {0}")]
    Source(#[from] SourceError),

    #[error("Input is empty: expected a header record")]
    EmptyInput,

    #[error("Invalid header: {0}")]
    Header(#[from] HeaderError),

    #[error("Column mapping failed: {0}")]
    Reorder(#[from] ReorderError),

    #[error("Configuration error: {0}. Check the command line flags and CSVLOAD_* variables.")]
    Config(String),

    /// A worker task ended abnormally
    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl LoadError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
