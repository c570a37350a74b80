use crate::{
    environment::Environment,
    storage::{validate_key, BlobStore, StorageError},
};

use async_trait::async_trait;
use std::{
    io,
    path::{Path, PathBuf},
};
use tracing::trace;
use url::Url;

/// A store that keeps each blob in a file named after its key.
#[derive(Debug, Clone)]
pub struct Disk {
    base_directory: PathBuf,
}

impl Disk {
    /// Loads a new instance of `Disk` rooted at the local base directory.
    pub fn load(environment: &Environment) -> Result<Self, StorageError> {
        Self::new(environment.local_base_directory())
    }

    pub fn new(base_directory: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_directory = base_directory.as_ref();
        let base_directory = match base_directory.is_absolute() {
            true => base_directory.to_path_buf(),
            false => std::env::current_dir()?.join(base_directory),
        };
        Ok(Self { base_directory })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Returns the file of `key`.
    pub fn locate(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_directory.join(key))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs_err::tokio::create_dir_all(parent).await?;
        }
        fs_err::tokio::write(path, bytes).await?;
        trace!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl BlobStore for Disk {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.locate(key)?;
        match fs_err::tokio::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(error) => Err(error.into()),
        }
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.locate(key)?;
        self.write(&path, bytes).await
    }

    /// Accepts `file://` URLs that point into the base directory.
    async fn put_via_authorized_url(&self, url: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = Url::parse(url)
            .ok()
            .filter(|parsed| parsed.scheme() == "file")
            .and_then(|parsed| parsed.to_file_path().ok())
            .ok_or_else(|| StorageError::Unsupported(format!("a disk store cannot write to {}", url)))?;
        let key = path
            .strip_prefix(&self.base_directory)
            .ok()
            .and_then(|relative| relative.to_str())
            .ok_or_else(|| StorageError::InvalidKey(url.to_string()))?;
        self.put(key, bytes).await
    }

    fn public_url(&self, key: &str) -> String {
        let path = self.base_directory.join(key);
        Url::from_file_path(&path)
            .map(String::from)
            .unwrap_or_else(|_| path.display().to_string())
    }
}
