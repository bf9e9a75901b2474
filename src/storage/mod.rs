//! Object storage boundary
//!
//! The cache talks to durable storage through the [`ObjectStore`] trait:
//! an S3-compatible backend for real deployments and a filesystem backend
//! for tests and single-host setups.

mod local;
mod s3_client;
mod types;

use std::time::Duration;

pub use local::LocalStorage;
pub use s3_client::S3Storage;
pub use types::ObjectMetadata;

/// Storage-specific errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Minimal object-store surface consumed by the artifact cache.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata-only lookup. Returns [`StorageError::ObjectNotFound`] when
    /// the key does not exist; any other failure is a backend error and must
    /// not be conflated with "not found".
    async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError>;

    /// Fetch an object's bytes.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Upload an object. Idempotent: rewriting an existing key with the same
    /// bytes is not an error, and a failed write must never leave a partial
    /// object visible.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<(), StorageError>;

    /// Issue a read URL valid for `expires_in` from now. The store keeps no
    /// link state.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StorageError>;
}
