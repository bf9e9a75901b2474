//! Streaming upload staging with SHA-256 digesting
//!
//! The uploaded body is consumed exactly once: every chunk is fed to the
//! hasher and appended to the staging file in the same pass, so the content
//! identifier is available the moment the stream ends without the payload
//! ever being held in memory. The size ceiling is enforced per chunk; an
//! oversize body is rejected without buffering the remainder.

use std::path::Path;

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// A fully staged upload: bytes on disk plus their content identifier.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    /// Hex-encoded SHA-256 of the exact uploaded bytes.
    pub digest: String,
    /// Total size in bytes.
    pub size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("failed to read upload stream: {0}")]
    Read(String),

    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stream an upload body to `dest`, hashing as it goes.
///
/// The stream yields [`StageError`] directly, so an upstream failure keeps
/// its classification (a transport body-limit rejection stays oversize, not
/// a generic read failure). Fails with [`StageError::TooLarge`] as soon as
/// the running total passes `max_bytes`; there is no partial-hash recovery.
pub async fn stage_stream<S>(
    mut body: S,
    dest: &Path,
    max_bytes: u64,
) -> Result<StagedUpload, StageError>
where
    S: Stream<Item = std::result::Result<Bytes, StageError>> + Unpin,
{
    let mut hasher = Sha256::new();
    let mut file = File::create(dest).await?;
    let mut size: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        if size > max_bytes {
            return Err(StageError::TooLarge { limit: max_bytes });
        }
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
    }

    file.flush().await?;

    Ok(StagedUpload {
        digest: hex::encode(hasher.finalize()),
        size,
    })
}

/// Compute the hex-encoded SHA-256 digest of a byte slice.
pub fn compute_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
