//! Object storage for raw snapshots and processed tables
//!
//! Production writes go to a Google Cloud Storage bucket through its
//! S3-compatible XML API. [`LocalStore`] mirrors the same key layout on disk
//! and [`MemoryStore`] keeps objects in process.

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub mod gcs;
pub mod layout;
pub mod local;
pub mod memory;

pub use gcs::GcsStore;
pub use local::LocalStore;
pub use memory::MemoryStore;

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub key: String,
    /// Fully qualified location, e.g. `gs://bucket/key`
    pub uri: String,
    /// SHA-256 of the uploaded bytes, hex encoded
    pub checksum: String,
    pub size: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Location of `key` as shown to users
    fn uri(&self, key: &str) -> String;

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<UploadResult>;

    /// Fails with [`IngestError::NotFound`](crate::IngestError::NotFound)
    /// when the key does not exist.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// All keys starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Upload with the retry policy used for fetches
pub async fn put_with_retry(
    store: &dyn ObjectStore,
    retry: &RetryPolicy,
    key: &str,
    data: Vec<u8>,
    content_type: &str,
) -> Result<UploadResult> {
    retry
        .run("object_put", move |attempt| {
            debug!(key, attempt, "Uploading object");
            store.put(key, data.clone(), content_type)
        })
        .await
}

/// Build the store selected by the configuration
pub async fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    config.validate()?;
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::Gcs => Arc::new(GcsStore::new(config)?),
        StorageBackend::Local => Arc::new(LocalStore::new(&config.local_dir).await?),
    };
    Ok(store)
}

pub(crate) fn upload_result(uri: String, key: &str, data: &[u8]) -> UploadResult {
    UploadResult {
        key: key.to_string(),
        uri,
        checksum: jobflow_common::checksum::sha256_hex(data),
        size: data.len() as u64,
    }
}
