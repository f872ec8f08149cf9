//! Error types for the ingestion pipeline

use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised while fetching, transforming or storing job postings
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Adzuna API returned {status} for page {page}: {body}")]
    Api { page: u32, status: u16, body: String },

    #[error("Adzuna API rejected the credentials ({status}); check ADZUNA_APP_ID and ADZUNA_APP_KEY")]
    Unauthorized { status: u16 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage rejected the request ({status}): {message}")]
    StorageRejected { status: u16, message: String },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            IngestError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            IngestError::Api { status, .. } => *status == 429 || *status >= 500,
            IngestError::Storage(_) | IngestError::Io(_) => true,
            _ => false,
        }
    }
}

impl From<jobflow_common::JobflowError> for IngestError {
    fn from(err: jobflow_common::JobflowError) -> Self {
        match err {
            jobflow_common::JobflowError::Io(e) => IngestError::Io(e),
            jobflow_common::JobflowError::Serialization(e) => IngestError::Json(e),
            jobflow_common::JobflowError::Config(msg) => IngestError::Config(msg),
        }
    }
}
