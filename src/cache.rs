//! Content-addressed PDF artifact cache
//!
//! Converting the same spreadsheet twice is pure waste: the external engine
//! invocation dominates request latency by orders of magnitude. Artifacts
//! are therefore keyed by the SHA-256 of the *source* bytes, turning repeat
//! uploads into a single metadata lookup. Keys are flat hex digests with no
//! prefix or index; writes are idempotent because identical keys imply
//! identical content.

use std::sync::Arc;
use std::time::Duration;

use crate::storage::{ObjectStore, StorageError};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Cache of converted PDFs in durable object storage.
#[derive(Clone)]
pub struct ArtifactCache {
    store: Arc<dyn ObjectStore>,
    link_ttl: Duration,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn ObjectStore>, link_ttl: Duration) -> Self {
        Self { store, link_ttl }
    }

    /// Metadata-only existence check. "Not found" is `false`; any other
    /// storage failure propagates and must not be treated as a miss.
    pub async fn contains(&self, digest: &str) -> Result<bool, StorageError> {
        match self.store.head(digest).await {
            Ok(_) => Ok(true),
            Err(StorageError::ObjectNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Store a converted PDF under its source digest. Writing a key that
    /// already exists rewrites it with byte-identical content, so no
    /// existence check is needed first.
    pub async fn store(&self, digest: &str, pdf: Vec<u8>) -> Result<(), StorageError> {
        let size = pdf.len();
        self.store.put(digest, pdf, PDF_CONTENT_TYPE).await?;
        tracing::info!(digest = %digest, size = size, "stored converted artifact");
        Ok(())
    }

    /// Issue a time-limited read link for a cached artifact. Idempotent:
    /// re-requesting before expiry yields a functionally equivalent link,
    /// and the cache tracks no link state.
    pub async fn issue_link(&self, digest: &str) -> Result<String, StorageError> {
        self.store.presign_get(digest, self.link_ttl).await
    }

    /// Link validity window.
    pub fn link_ttl(&self) -> Duration {
        self.link_ttl
    }
}
