//! HTTP server setup and routing

use crate::config::Config;
use crate::db::{ErrorSink, HistoryRecorder};
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::pipeline::validate::MAX_SIZE_BYTES;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub pipeline: Arc<Pipeline>,
    pub history: HistoryRecorder,
    pub error_sink: ErrorSink,
}

/// Build the application router
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/v1/inference/submit", post(super::handlers::submit_inference))
        .route("/v1/inference/history", get(super::handlers::list_history))
        .with_state(ctx)
        // Room for the 100 MB cap plus multipart framing; the validation
        // gate still enforces the exact limit per file
        .layer(DefaultBodyLimit::max(MAX_SIZE_BYTES + 1024 * 1024))
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server
pub async fn run(config: &Config, ctx: AppContext) -> Result<()> {
    let app = build_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
