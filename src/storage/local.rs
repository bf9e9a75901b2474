//! Filesystem storage backend
//!
//! Used by tests and single-host deployments where an S3 endpoint is not
//! available. Keys map directly to file names under the base directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ObjectMetadata, ObjectStore, StorageError};

/// Filesystem-backed object store
#[derive(Clone)]
pub struct LocalStorage {
    base: PathBuf,
}

impl LocalStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.base.join(key)
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalStorage {
    async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let path = self.object_path(key);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(ObjectMetadata {
                key: key.to_string(),
                size: meta.len() as i64,
                content_type: None,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::ObjectNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::ObjectNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.base).await?;

        // Stage through a uniquely named temp file and rename so neither a
        // crashed write nor a racing write of the same key ever leaves a
        // partial object visible under the real key.
        let path = self.object_path(key);
        let staging = tempfile::NamedTempFile::new_in(&self.base)?;
        tokio::fs::write(staging.path(), &data).await?;
        staging
            .persist(&path)
            .map_err(|e| StorageError::Io(e.error))?;

        Ok(())
    }

    async fn presign_get(&self, key: &str, _expires_in: Duration) -> Result<String, StorageError> {
        // Local files carry no signature; the "link" is the file itself.
        let path = self.object_path(key);
        if !path.exists() {
            return Err(StorageError::ObjectNotFound(key.to_string()));
        }
        Ok(format!("file://{}", absolutize(&path).display()))
    }
}

fn absolutize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
