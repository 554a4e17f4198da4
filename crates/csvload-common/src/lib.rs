//! csvload common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error type and logging setup for the csvload workspace.
//!
//! # Example
//!
//! ```no_run
//! use csvload_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> csvload_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!
//!     info!("Loader started");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
