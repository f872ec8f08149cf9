//! In-process object store

use super::{upload_result, ObjectStore, UploadResult};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Objects held in a sorted map, keyed like the bucket
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Copy of a stored object with its content type
    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn uri(&self, key: &str) -> String {
        format!("mem://{}/{}", self.name, key)
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<UploadResult> {
        let result = upload_result(self.uri(key), key, &data);
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(result)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| IngestError::NotFound(self.uri(key)))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_overwrite_and_list() {
        let store = MemoryStore::new("bucket");
        store.put("b/2", vec![2], "text/csv").await.unwrap();
        store.put("a/1", vec![1], "text/csv").await.unwrap();
        store.put("a/1", vec![9], "application/json").await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("a/1").await.unwrap(), vec![9]);
        assert_eq!(store.object("a/1").await.unwrap().content_type, "application/json");
        assert_eq!(store.list("").await.unwrap(), vec!["a/1", "b/2"]);
        assert_eq!(store.list("b/").await.unwrap(), vec!["b/2"]);
        assert!(matches!(store.get("c").await, Err(IngestError::NotFound(_))));
    }
}
