use crate::storage::{validate_key, BlobStore, StorageError};

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use url::Url;

const SCHEME: &str = "memory";

/// A store kept in process memory. Clones share the same blobs.
#[derive(Debug, Clone, Default)]
pub struct InMemory {
    storage: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a given key exists in storage. Otherwise, returns `false`.
    pub async fn contains_key(&self, key: &str) -> bool {
        self.storage.read().await.contains_key(key)
    }

    /// Replaces a stored blob, for tests that tamper with the chain.
    pub async fn overwrite(&self, key: &str, bytes: Vec<u8>) {
        self.storage.write().await.insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl BlobStore for InMemory {
    #[inline]
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.storage
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    #[inline]
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        self.storage.write().await.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    /// Accepts the `memory:///<key>` URLs returned by `public_url`.
    async fn put_via_authorized_url(&self, url: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let parsed = Url::parse(url).map_err(|_| StorageError::InvalidKey(url.to_string()))?;
        if parsed.scheme() != SCHEME {
            return Err(StorageError::Unsupported(format!(
                "an in-memory store cannot write to {}",
                url
            )));
        }
        let key = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .ok_or_else(|| StorageError::InvalidKey(url.to_string()))?;
        self.put(key, bytes).await
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}:///{}", SCHEME, key)
    }
}
