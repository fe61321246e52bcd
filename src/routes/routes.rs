//! Defines the proxy's HTTP surface.
//!
//! ## Structure
//! - `POST /upload`             — multipart upload, field `file`
//! - `GET  /file/{identifier}`  — fetch, local tier first, remote fallback
//! - `GET  /healthz`, `/readyz` — liveness and readiness probes

use crate::{
    handlers::{
        file_handlers::{get_file, upload_file},
        health_handlers::{healthz, readyz},
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the router for all proxy routes.
///
/// Handlers share the `StorageService` as router state.
pub fn routes() -> Router<StorageService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/upload", post(upload_file))
        .route("/file/{identifier}", get(get_file))
}

/// Full application: routes, state, body limit and request tracing.
pub fn app(service: StorageService, max_upload_bytes: usize) -> Router {
    routes()
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
