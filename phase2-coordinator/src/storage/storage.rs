use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no blob is stored under {0:?}")]
    NotFound(String),

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("request to {url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unsupported(String),

    #[error("{0:?} is not a valid storage key")]
    InvalidKey(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),
}

/// A key/value store for ceremony artifacts.
///
/// Keys are written once by convention and never overwritten by the ceremony.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the blob stored under `key`, or `StorageError::NotFound`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Stores `bytes` under `key`.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Stores `bytes` through a temporary authorized URL, which embeds its target key.
    async fn put_via_authorized_url(&self, url: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Returns the public address of `key`, as published in attestations.
    fn public_url(&self, key: &str) -> String;
}

/// Checks that a key is a single, plain path segment.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.'));
    match valid {
        true => Ok(()),
        false => Err(StorageError::InvalidKey(key.to_string())),
    }
}
