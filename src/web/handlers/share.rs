//! Share handlers for the teledrive HTTP API.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::web::dto::{ApiResponse, ShareResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// PUT /api/share/:file_id - Toggle public sharing of a file.
pub async fn toggle_share(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<ShareResponse>>, ApiError> {
    let share = state.sharing.toggle_share(file_id).await?;
    Ok(Json(ApiResponse::new(ShareResponse::from(share))))
}

/// GET /api/share/:token - Follow a public link.
///
/// Redirects (302) to the download resource of the shared file.
pub async fn open_share(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let file = state.sharing.resolve_token(&token).await?;
    tracing::debug!(file_id = file.id, "Share link opened");

    let location = format!("/api/files/{}/download", file.id);
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
