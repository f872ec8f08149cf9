//! Jobflow Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling, logging and hashing for the jobflow workspace.
//!
//! - **Error Handling**: [`JobflowError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Checksums**: SHA-256 helpers used for job ids and upload digests
//!
//! # Example
//!
//! ```no_run
//! use jobflow_common::checksum::sha256_hex;
//! use jobflow_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!(digest = %sha256_hex(b"payload"), "hashed");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{JobflowError, Result};
