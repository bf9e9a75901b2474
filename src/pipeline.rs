//! Conversion request pipeline
//!
//! One request moves through the stages strictly in order, each depending
//! on the previous stage's output file:
//!
//! validate -> stage (digest while streaming) -> cache probe
//!          -> normalize -> convert -> store -> link / inline
//!
//! Any stage failure aborts the request; nothing is retried and no partial
//! artifact is ever linked. All scratch state lives in a per-request
//! [`TempDir`], so concurrent requests never share paths and cleanup happens
//! on every exit path, including failure.

use std::path::Path;

use axum::body::Bytes;
use futures::Stream;
use tempfile::TempDir;

use crate::cache::ArtifactCache;
use crate::checksum::{self, StageError};
use crate::config::{XLSX_CONTENT_TYPE, XLSX_EXTENSION};
use crate::convert::Converter;
use crate::error::{AppError, Result, ValidationError};
use crate::normalize;

/// What the client declared about the upload.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub filename: String,
    pub content_type: Option<String>,
}

/// How the finished PDF reaches the client.
#[derive(Debug)]
pub enum ConversionOutcome {
    /// The PDF bytes travel in the response body.
    Inline { filename: String, pdf: Vec<u8> },
    /// The PDF lives in the cache; the client gets a time-limited link.
    Linked {
        filename: String,
        url: String,
        cache_hit: bool,
    },
}

/// Per-request orchestrator. Construction decides the delivery mode once:
/// with a cache attached, identical uploads convert at most once; without
/// one, every request converts and returns the bytes inline.
pub struct ConversionPipeline {
    converter: Converter,
    cache: Option<ArtifactCache>,
    max_upload_bytes: u64,
}

impl ConversionPipeline {
    pub fn new(converter: Converter, cache: Option<ArtifactCache>, max_upload_bytes: u64) -> Self {
        Self {
            converter,
            cache,
            max_upload_bytes,
        }
    }

    pub fn cache(&self) -> Option<&ArtifactCache> {
        self.cache.as_ref()
    }

    /// Run one upload through the pipeline.
    pub async fn run<S>(&self, meta: UploadMeta, body: S) -> Result<ConversionOutcome>
    where
        S: Stream<Item = std::result::Result<Bytes, StageError>> + Unpin,
    {
        validate_upload(&meta)?;

        let source_name = basename(&meta.filename);
        let pdf_name = pdf_filename(source_name);

        // Request-scoped scratch dir; dropped (and deleted) on every path.
        let workdir = TempDir::new()?;
        let source_path = workdir.path().join(source_name);

        let staged = checksum::stage_stream(body, &source_path, self.max_upload_bytes).await?;
        tracing::info!(
            digest = %staged.digest,
            size = staged.size,
            filename = %source_name,
            "upload staged"
        );

        if let Some(cache) = &self.cache {
            if cache.contains(&staged.digest).await? {
                let url = cache.issue_link(&staged.digest).await?;
                tracing::info!(digest = %staged.digest, "cache hit, conversion skipped");
                return Ok(ConversionOutcome::Linked {
                    filename: pdf_name,
                    url,
                    cache_hit: true,
                });
            }
        }

        // Normalization overwrites the staged file; the converter must see
        // the rewritten bytes.
        let normalize_path = source_path.clone();
        tokio::task::spawn_blocking(move || normalize::normalize_print_layout(&normalize_path))
            .await
            .map_err(|e| AppError::Internal(format!("normalization task panicked: {e}")))??;

        let pdf_path = self
            .converter
            .convert_to_pdf(&source_path, workdir.path())
            .await?;
        let pdf = tokio::fs::read(&pdf_path).await?;

        match &self.cache {
            Some(cache) => {
                cache.store(&staged.digest, pdf).await?;
                let url = cache.issue_link(&staged.digest).await?;
                Ok(ConversionOutcome::Linked {
                    filename: pdf_name,
                    url,
                    cache_hit: false,
                })
            }
            None => Ok(ConversionOutcome::Inline {
                filename: pdf_name,
                pdf,
            }),
        }
    }
}

/// Filename and MIME gate. Content is not sniffed here; a lying client is
/// caught later when the normalizer rejects a non-workbook payload.
fn validate_upload(meta: &UploadMeta) -> std::result::Result<(), ValidationError> {
    if !meta.filename.to_lowercase().ends_with(XLSX_EXTENSION) {
        return Err(ValidationError::UnsupportedExtension(meta.filename.clone()));
    }

    match meta.content_type.as_deref() {
        Some(XLSX_CONTENT_TYPE) => Ok(()),
        Some(other) => Err(ValidationError::UnsupportedContentType(other.to_string())),
        None => Err(ValidationError::UnsupportedContentType("none".to_string())),
    }
}

/// Client filenames may carry path fragments; only the basename ever
/// touches the filesystem.
fn basename(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("upload.xlsx")
}

/// Derive the delivered filename: original stem, forced `.pdf` suffix.
fn pdf_filename(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("converted");
    format!("{stem}.pdf")
}
