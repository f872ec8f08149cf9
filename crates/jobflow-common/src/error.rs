//! Error types shared across jobflow crates

use thiserror::Error;

/// Result type alias for shared jobflow operations
pub type Result<T> = std::result::Result<T, JobflowError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug)]
pub enum JobflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl JobflowError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
