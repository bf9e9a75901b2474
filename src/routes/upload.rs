//! Upload form and conversion endpoint
//!
//! `GET /` serves the upload form; `POST /` takes a `multipart/form-data`
//! body with a single `uploaded_file` field and runs it through the
//! conversion pipeline. The field's body is handed to the pipeline as a
//! stream, so the upload is never buffered whole in memory here.

use axum::{
    body::Body,
    extract::{
        multipart::MultipartError,
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use futures::TryStreamExt;

use crate::checksum::StageError;
use crate::error::{AppError, Result, ValidationError};
use crate::html;
use crate::pipeline::{ConversionOutcome, UploadMeta};
use crate::state::AppState;

/// Multipart boundaries and part headers ride alongside the file bytes;
/// the body limit leaves room for them on a max-size upload.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the upload router
pub fn router(max_upload_bytes: u64) -> Router<AppState> {
    Router::new()
        .route("/", get(upload_form).post(convert_upload))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes as usize + MULTIPART_OVERHEAD,
        ))
}

/// Serve the upload form
pub async fn upload_form() -> Html<String> {
    Html(html::render_upload_form())
}

/// Accept an upload and return the converted PDF or a link to it
pub async fn convert_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let limit = state.config().upload.max_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::from(stage_error(e, limit)))?
    {
        if field.name() != Some("uploaded_file") {
            tracing::debug!(field = ?field.name(), "skipping unexpected multipart field");
            continue;
        }

        let meta = UploadMeta {
            filename: field.file_name().unwrap_or_default().to_string(),
            content_type: field.content_type().map(|s| s.to_string()),
        };

        let body = field.map_err(move |e| stage_error(e, limit));
        let outcome = state.pipeline().run(meta, Box::pin(body)).await?;
        return Ok(respond(outcome, &state));
    }

    Err(ValidationError::MissingFile.into())
}

/// Most multipart read failures are transport noise, but a body-limit
/// rejection is the client's oversize upload and must keep that
/// classification wherever in the read it surfaces.
fn stage_error(e: MultipartError, limit: u64) -> StageError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StageError::TooLarge { limit }
    } else {
        StageError::Read(e.to_string())
    }
}

fn respond(outcome: ConversionOutcome, state: &AppState) -> Response {
    match outcome {
        ConversionOutcome::Inline { filename, pdf } => {
            let length = pdf.len();
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/pdf")
                .header(header::CONTENT_LENGTH, length)
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}\"", filename),
                )
                .body(Body::from(pdf))
                .unwrap_or_else(|e| {
                    AppError::Internal(format!("failed to build response: {e}")).into_response()
                })
        }
        ConversionOutcome::Linked {
            filename,
            url,
            cache_hit,
        } => {
            let ttl_hours = state.config().link_ttl.as_secs() / 3600;
            Html(html::render_link_page(&filename, &url, ttl_hours, cache_hit)).into_response()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cache::ArtifactCache;
    use crate::config::{
        Config, ConverterConfig, DeliveryMode, ServerConfig, UploadConfig, XLSX_CONTENT_TYPE,
    };
    use crate::convert::Converter;
    use crate::pipeline::ConversionPipeline;
    use crate::storage::LocalStorage;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fake_engine(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("soffice");
        let script = "#!/bin/sh\nwhile [ $# -gt 2 ]; do shift; done\noutdir=\"$1\"\nsrc=\"$2\"\nbase=$(basename \"$src\" .xlsx)\nprintf '%%PDF-1.4 fake' > \"$outdir/$base.pdf\"\n";
        std::fs::write(&path, script).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn test_config(engine: PathBuf, delivery: DeliveryMode) -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            upload: UploadConfig {
                max_bytes: 1024 * 1024,
            },
            converter: ConverterConfig {
                binary: engine,
                timeout: Duration::from_secs(10),
            },
            delivery,
            storage: None,
            link_ttl: Duration::from_secs(6 * 60 * 60),
        }
    }

    fn server(config: Config, cache: Option<ArtifactCache>) -> TestServer {
        let converter = Converter::new(&config.converter);
        let pipeline = ConversionPipeline::new(converter, cache, config.upload.max_bytes);
        let state = AppState::new(config.clone(), pipeline);
        let app = router(config.upload.max_bytes).with_state(state);
        TestServer::new(app).unwrap()
    }

    fn xlsx_part() -> Part {
        Part::bytes(crate::normalize::minimal_xlsx())
            .file_name("Q1.xlsx")
            .mime_type(XLSX_CONTENT_TYPE)
    }

    #[tokio::test]
    async fn the_upload_form_is_served() {
        let dir = TempDir::new().unwrap();
        let server = server(test_config(fake_engine(&dir), DeliveryMode::Inline), None);

        let response = server.get("/").await;
        response.assert_status_ok();
        assert!(response.text().contains("uploaded_file"));
    }

    #[tokio::test]
    async fn missing_file_field_is_a_bad_request() {
        let dir = TempDir::new().unwrap();
        let server = server(test_config(fake_engine(&dir), DeliveryMode::Inline), None);

        let response = server
            .post("/")
            .multipart(MultipartForm::new().add_part(
                "something_else",
                Part::bytes(b"x".to_vec()).file_name("Q1.xlsx"),
            ))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let server = server(test_config(fake_engine(&dir), DeliveryMode::Inline), None);

        let part = Part::bytes(crate::normalize::minimal_xlsx())
            .file_name("report.xls")
            .mime_type(XLSX_CONTENT_TYPE);
        let response = server
            .post("/")
            .multipart(MultipartForm::new().add_part("uploaded_file", part))
            .await;
        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn wrong_mime_type_is_rejected() {
        let dir = TempDir::new().unwrap();
        let server = server(test_config(fake_engine(&dir), DeliveryMode::Inline), None);

        let part = Part::bytes(crate::normalize::minimal_xlsx())
            .file_name("Q1.xlsx")
            .mime_type("application/zip");
        let response = server
            .post("/")
            .multipart(MultipartForm::new().add_part("uploaded_file", part))
            .await;
        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn oversize_upload_is_payload_too_large() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(fake_engine(&dir), DeliveryMode::Inline);
        config.upload.max_bytes = 1024;
        let server = server(config, None);

        // Over the ceiling but under the multipart overhead margin; the
        // staging pass trips the limit.
        let part = Part::bytes(vec![0u8; 4 * 1024])
            .file_name("big.xlsx")
            .mime_type(XLSX_CONTENT_TYPE);
        let response = server
            .post("/")
            .multipart(MultipartForm::new().add_part("uploaded_file", part))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn oversize_past_the_body_limit_is_still_payload_too_large() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(fake_engine(&dir), DeliveryMode::Inline);
        config.upload.max_bytes = 1024;
        let server = server(config, None);

        // Large enough that the transport body limit rejects the read; the
        // client still sees oversize, not a generic read failure.
        let part = Part::bytes(vec![0u8; 80 * 1024])
            .file_name("big.xlsx")
            .mime_type(XLSX_CONTENT_TYPE);
        let response = server
            .post("/")
            .multipart(MultipartForm::new().add_part("uploaded_file", part))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn inline_conversion_delivers_the_pdf() {
        let dir = TempDir::new().unwrap();
        let server = server(test_config(fake_engine(&dir), DeliveryMode::Inline), None);

        let response = server
            .post("/")
            .multipart(MultipartForm::new().add_part("uploaded_file", xlsx_part()))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            "inline; filename=\"Q1.pdf\""
        );
        assert_eq!(response.header(header::CONTENT_TYPE), "application/pdf");
        assert!(!response.as_bytes().is_empty());
    }

    #[tokio::test]
    async fn cached_conversion_links_to_the_artifact() {
        let dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(
            Arc::new(LocalStorage::new(store_dir.path())),
            Duration::from_secs(6 * 60 * 60),
        );
        let server = server(
            test_config(fake_engine(&dir), DeliveryMode::Cached),
            Some(cache),
        );

        let response = server
            .post("/")
            .multipart(MultipartForm::new().add_part("uploaded_file", xlsx_part()))
            .await;

        response.assert_status_ok();
        let text = response.text();
        assert!(text.contains("Download Q1.pdf"));
        assert!(text.contains("expires in 6 hours"));
    }
}
