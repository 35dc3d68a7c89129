//! Router configuration for the teledrive HTTP API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_folder, download_file, get_file, list_files, list_folders, open_share, session_status,
    toggle_share, update_file, update_folder, upload_chunk, upload_file, AppState,
};
use super::middleware::create_cors_layer;

/// Create the main API router.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let body_limit = app_state.body_limit();

    let file_routes = Router::new()
        .route("/files", get(list_files).post(upload_file))
        .route("/files/chunks", post(upload_chunk))
        .route("/files/:id", get(get_file).patch(update_file))
        .route("/files/:id/download", get(download_file))
        .route("/sessions/:id", get(session_status));

    let folder_routes = Router::new()
        .route("/folders", get(list_folders).post(create_folder))
        .route("/folders/:id", patch(update_folder));

    // One segment serves both directions: file id for PUT, token for GET.
    let share_routes = Router::new().route("/share/:id", put(toggle_share).get(open_share));

    let api_routes = Router::new()
        .merge(file_routes)
        .merge(folder_routes)
        .merge(share_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
