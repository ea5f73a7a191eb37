//! HTTP API for the thematic service.
//!
//! This module provides the REST API endpoints for:
//! - Health and metrics monitoring
//! - Document management

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::db::Database;
use crate::permissions::PermissionChecker;
use crate::service::DocumentService;

pub mod auth;
pub mod documents;
use documents::{
    bulk_upload_handler, delete_document_handler, get_document_handler,
    list_project_documents_handler, update_document_handler, upload_document_handler,
};

/// Headroom on top of the file itself for multipart framing and text fields
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state
pub struct AppState {
    pub db: Arc<Database>,
    pub service: Arc<DocumentService>,
    pub permissions: PermissionChecker,
    pub metrics: Option<PrometheusHandle>,
    pub start_time: Instant,
}

/// Build the API router
pub fn router(
    db: Arc<Database>,
    config: &ServiceConfig,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let state = Arc::new(AppState {
        service: Arc::new(DocumentService::new(db.clone(), config)),
        permissions: PermissionChecker::new(db.clone()),
        db,
        metrics,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_upload_body =
        (config.uploads.max_document_size_bytes as usize).saturating_add(MULTIPART_OVERHEAD_BYTES);
    let max_bulk_body = config.uploads.max_bulk_upload_bytes as usize;

    let api_routes = Router::new()
        .route(
            "/documents",
            post(upload_document_handler).layer(DefaultBodyLimit::max(max_upload_body)),
        )
        .route(
            "/documents/",
            post(upload_document_handler).layer(DefaultBodyLimit::max(max_upload_body)),
        )
        .route(
            "/documents/bulk-upload",
            post(bulk_upload_handler).layer(DefaultBodyLimit::max(max_bulk_body)),
        )
        .route(
            "/documents/project/{project_id}",
            get(list_project_documents_handler),
        )
        .route(
            "/documents/{document_id}",
            get(get_document_handler)
                .put(update_document_handler)
                .delete(delete_document_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
