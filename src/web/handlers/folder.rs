//! Folder handlers for the teledrive HTTP API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::file::parse_parent_ref;
use crate::web::dto::{
    ApiResponse, CreateFolderRequest, FolderQuery, FolderResponse, UpdateFolderRequest,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// GET /api/folders?parentId= - List the folders of one level.
pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<ApiResponse<Vec<FolderResponse>>>, ApiError> {
    let parent = parse_parent_ref(query.folder_id.as_deref())?;
    let folders = state.library.list_folders(parent).await?;

    Ok(Json(ApiResponse::new(
        folders.into_iter().map(FolderResponse::from).collect(),
    )))
}

/// POST /api/folders - Create a folder.
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FolderResponse>>), ApiError> {
    let parent = match req.parent_id {
        Some(ref parent) => parent.resolve()?,
        None => None,
    };
    let folder = state.library.create_folder(&req.name, parent).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FolderResponse::from(folder))),
    ))
}

/// PATCH /api/folders/:id - Rename and/or move a folder.
pub async fn update_folder(
    State(state): State<Arc<AppState>>,
    Path(folder_id): Path<i64>,
    Json(req): Json<UpdateFolderRequest>,
) -> Result<Json<ApiResponse<FolderResponse>>, ApiError> {
    if req.name.is_none() && req.parent_id.is_none() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    // Resolve the target first so a bad reference leaves the name untouched.
    let parent = match req.parent_id {
        Some(ref parent) => Some(parent.resolve()?),
        None => None,
    };

    let mut folder = None;
    if let Some(ref name) = req.name {
        folder = Some(state.library.rename_folder(folder_id, name).await?);
    }
    if let Some(parent) = parent {
        folder = Some(state.library.move_folder(folder_id, parent).await?);
    }

    let folder = folder.ok_or_else(|| ApiError::internal("Folder update produced no result"))?;
    Ok(Json(ApiResponse::new(FolderResponse::from(folder))))
}
