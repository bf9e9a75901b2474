//! Error types for the Sheetpress server
//!
//! Every stage failure is folded into [`AppError`] at the handler boundary
//! and rendered as an HTML error page. Diagnostic detail stays in the server
//! log; the client-facing text describes the failure class in general terms.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::checksum::StageError;
use crate::convert::ConvertError;
use crate::html;
use crate::normalize::NormalizeError;
use crate::storage::StorageError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Per-request validation failures. These are the client's fault and carry
/// a specific message.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("no file was provided; use the \"uploaded_file\" form field")]
    MissingFile,

    #[error("unsupported file name {0:?}; only .xlsx spreadsheets are accepted")]
    UnsupportedExtension(String),

    #[error("unsupported content type {0:?}; only .xlsx spreadsheets are accepted")]
    UnsupportedContentType(String),

    #[error("the uploaded file exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to read upload: {0}")]
    UploadRead(String),

    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StageError> for AppError {
    fn from(e: StageError) -> Self {
        match e {
            StageError::TooLarge { limit } => {
                AppError::Validation(ValidationError::TooLarge { limit })
            }
            StageError::Read(msg) => AppError::UploadRead(msg),
            StageError::Io(e) => AppError::Io(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, message) = match &self {
            AppError::Validation(e) => {
                let status = match e {
                    ValidationError::MissingFile => StatusCode::BAD_REQUEST,
                    ValidationError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    ValidationError::UnsupportedExtension(_)
                    | ValidationError::UnsupportedContentType(_) => {
                        StatusCode::UNSUPPORTED_MEDIA_TYPE
                    }
                };
                (status, "Invalid upload", e.to_string())
            }
            AppError::UploadRead(msg) => {
                tracing::error!("upload read failed: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    "Upload failed",
                    "The upload could not be read. Please try again.".to_string(),
                )
            }
            AppError::Normalize(e) => {
                tracing::error!("normalization failed: {}", e);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Invalid spreadsheet",
                    "The uploaded file could not be read as an .xlsx workbook.".to_string(),
                )
            }
            AppError::Convert(e) => {
                tracing::error!("conversion failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Conversion failed",
                    "The spreadsheet could not be converted to PDF.".to_string(),
                )
            }
            AppError::Storage(e) => {
                tracing::error!("storage error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage error",
                    "The converted document could not be stored or linked.".to_string(),
                )
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                    "An internal error occurred.".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                    "An internal error occurred.".to_string(),
                )
            }
        };

        let body = html::render_error_page(title, &message);

        (
            status,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn validation_errors_map_to_client_statuses() {
        let cases = [
            (ValidationError::MissingFile, StatusCode::BAD_REQUEST),
            (
                ValidationError::TooLarge { limit: 1024 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                ValidationError::UnsupportedExtension("report.xls".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                ValidationError::UnsupportedContentType("text/plain".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn oversize_stage_error_becomes_413() {
        let err: AppError = StageError::TooLarge { limit: 100 }.into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn conversion_failure_is_generic_to_the_client() {
        let err = AppError::Convert(ConvertError::MissingOutput);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        // Client-facing text must not leak engine internals.
        assert!(body.contains("could not be converted"));
        assert!(!body.contains("stderr"));
    }
}
