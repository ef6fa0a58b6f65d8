// In-memory BlobStore
//
// Keeps uploads in a process-local map keyed by random UUID. Intended for
// the CLI and tests; contents are lost when the store is dropped.

use super::{BlobStore, StorageRef};
use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<StorageRef, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<StorageRef, StorageError> {
        let reference = StorageRef::new();
        debug!(%reference, size = bytes.len(), "Blob stored");
        self.blobs.write().await.insert(reference, bytes);
        Ok(reference)
    }

    async fn get(&self, reference: &StorageRef) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryBlobStore::new();
        let reference = store.put(b"barangay clearance".to_vec()).await.unwrap();
        assert_eq!(store.get(&reference).await.unwrap(), b"barangay clearance");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let store = InMemoryBlobStore::new();
        let result = store.get(&StorageRef::new()).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clones_share_contents() {
        let store = InMemoryBlobStore::new();
        let other = store.clone();
        let reference = store.put(vec![1, 2, 3]).await.unwrap();
        assert_eq!(other.get(&reference).await.unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_storage_ref_parse() {
        let reference = StorageRef::new();
        let parsed: StorageRef = reference.to_string().parse().unwrap();
        assert_eq!(parsed, reference);
        assert!("not-a-uuid".parse::<StorageRef>().is_err());
    }
}
