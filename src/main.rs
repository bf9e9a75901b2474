//! Sheetpress Server
//!
//! Spreadsheet-to-PDF conversion over HTTP: uploads are digested, deduped
//! against an S3-backed content-addressed cache, print-layout normalized,
//! and converted through an external engine.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sheetpress_server::cache::ArtifactCache;
use sheetpress_server::config::{Config, DeliveryMode};
use sheetpress_server::convert::Converter;
use sheetpress_server::pipeline::ConversionPipeline;
use sheetpress_server::routes;
use sheetpress_server::state::AppState;
use sheetpress_server::storage::S3Storage;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetpress_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; a bad environment is fatal before we bind.
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting Sheetpress Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Conversion engine: {}", config.converter.binary.display());
    tracing::info!("Delivery mode: {:?}", config.delivery);

    let converter = Converter::new(&config.converter);
    if !converter.is_available().await {
        tracing::warn!(
            "Conversion engine at {} did not answer --version; conversions may fail",
            config.converter.binary.display()
        );
    }

    // The artifact cache only exists in cached delivery mode.
    let cache = match (config.delivery, &config.storage) {
        (DeliveryMode::Cached, Some(storage_config)) => {
            let storage = S3Storage::new(storage_config)
                .await
                .expect("Failed to initialize S3 storage");
            tracing::info!("Artifact cache bucket: {}", storage.bucket());
            Some(ArtifactCache::new(Arc::new(storage), config.link_ttl))
        }
        _ => None,
    };

    let pipeline = ConversionPipeline::new(converter, cache, config.upload.max_bytes);
    let state = AppState::new(config.clone(), pipeline);

    // Build router
    let app = Router::new()
        .merge(routes::upload::router(config.upload.max_bytes))
        .nest("/health", routes::health::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid SERVER_HOST/SERVER_PORT");
    tracing::info!("Sheetpress Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shutdown complete");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
