//! File handlers for the teledrive HTTP API.

use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::Response,
    Json,
};
use bytes::Bytes;
use std::sync::Arc;

use crate::file::parse_parent_ref;
use crate::upload::ChunkUpload;
use crate::web::dto::{
    ApiResponse, ChunkUploadResponse, FileResponse, FolderQuery, SessionStatusResponse,
    UpdateFileRequest, UploadResponse,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Control characters are dropped, quotes and backslashes are replaced in
/// the ASCII fallback, and non-ASCII names get an RFC 5987 `filename*`.
pub(crate) fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

/// Body limit rejections are oversized files, reported like any other
/// oversized upload.
fn multipart_error(e: MultipartError, limit: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::bad_request(format!("Upload exceeds the {limit} byte request limit"))
    } else {
        tracing::warn!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    }
}

async fn field_text(field: Field<'_>, limit: usize) -> Result<String, ApiError> {
    field.text().await.map_err(|e| multipart_error(e, limit))
}

async fn field_bytes(field: Field<'_>, limit: usize) -> Result<Bytes, ApiError> {
    field.bytes().await.map_err(|e| multipart_error(e, limit))
}

fn parse_int(name: &str, value: Option<String>) -> Result<Option<i64>, ApiError> {
    value
        .map(|v| {
            v.trim()
                .parse::<i64>()
                .map_err(|_| ApiError::bad_request(format!("{name} is not an integer")))
        })
        .transpose()
}

/// POST /api/files - Upload a file as one blob.
///
/// Multipart fields: `file` (required), `parentFolderId` (optional, `root`
/// or absent for the root folder).
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    let limit = state.body_limit();
    let mut filename: Option<String> = None;
    let mut content: Option<Bytes> = None;
    let mut parent: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                content = Some(field_bytes(field, limit).await?);
            }
            "parentFolderId" | "parentId" => parent = Some(field_text(field, limit).await?),
            _ => {}
        }
    }

    let content = content.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let filename = filename.ok_or_else(|| ApiError::bad_request("File has no name"))?;
    let parent_folder_id = parse_parent_ref(parent.as_deref())?;

    let record = state
        .uploads
        .upload_single(content, &filename, parent_folder_id)
        .await?;

    let blob = record.storage.blob();
    Ok(Json(ApiResponse::new(UploadResponse {
        file_id: record.id,
        message_id: blob.message_id,
        blob_id: blob.blob_id,
        file: FileResponse::from(record),
    })))
}

/// POST /api/files/chunks - Upload one chunk of a client-split file.
///
/// Multipart fields: `chunk`, `originalFilename`, `uploadSessionId`,
/// `chunkIndex`, `totalChunks` (all required), `totalSize` and
/// `parentFolderId` (optional).
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ChunkUploadResponse>>, ApiError> {
    let limit = state.body_limit();
    let mut content: Option<Bytes> = None;
    let mut filename: Option<String> = None;
    let mut session_id: Option<String> = None;
    let mut chunk_index: Option<String> = None;
    let mut total_chunks: Option<String> = None;
    let mut total_size: Option<String> = None;
    let mut parent: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "chunk" => content = Some(field_bytes(field, limit).await?),
            "originalFilename" => filename = Some(field_text(field, limit).await?),
            "uploadSessionId" => session_id = Some(field_text(field, limit).await?),
            "chunkIndex" => chunk_index = Some(field_text(field, limit).await?),
            "totalChunks" => total_chunks = Some(field_text(field, limit).await?),
            "totalSize" => total_size = Some(field_text(field, limit).await?),
            "parentFolderId" | "parentId" => parent = Some(field_text(field, limit).await?),
            _ => {}
        }
    }

    let missing = |field: &str| ApiError::bad_request(format!("Missing field: {field}"));
    let chunk = ChunkUpload {
        content: content.ok_or_else(|| missing("chunk"))?,
        filename: filename.ok_or_else(|| missing("originalFilename"))?,
        session_id: session_id.ok_or_else(|| missing("uploadSessionId"))?,
        chunk_index: parse_int("chunkIndex", chunk_index)?.ok_or_else(|| missing("chunkIndex"))?,
        total_chunks: parse_int("totalChunks", total_chunks)?
            .ok_or_else(|| missing("totalChunks"))?,
        total_size: parse_int("totalSize", total_size)?,
        parent_folder_id: parse_parent_ref(parent.as_deref())?,
    };

    let record = state.uploads.upload_chunk(chunk).await?;
    let placement = record
        .chunk()
        .ok_or_else(|| ApiError::internal("Chunk record has no chunk placement"))?;

    Ok(Json(ApiResponse::new(ChunkUploadResponse {
        chunk_record_id: record.id,
        message_id_for_chunk: placement.message_id,
        session_id: placement.upload_session_id.clone(),
        chunk_index: placement.chunk_index,
        total_chunks: placement.total_chunks,
    })))
}

/// GET /api/files?folderId= - List the files of one folder.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let parent = parse_parent_ref(query.folder_id.as_deref())?;
    let files = state.library.list_files(parent).await?;

    Ok(Json(ApiResponse::new(
        files.into_iter().map(FileResponse::from).collect(),
    )))
}

/// GET /api/files/:id - Get file metadata.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let file = state.library.get_file(file_id).await?;
    Ok(Json(ApiResponse::new(FileResponse::from(file))))
}

/// PATCH /api/files/:id - Rename and/or move a file.
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
    Json(req): Json<UpdateFileRequest>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    if req.name.is_none() && req.parent_folder_id.is_none() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    let parent = req.parent_folder_id.map(|p| p.resolve()).transpose()?;
    let file = state
        .library
        .update_file(file_id, req.name.as_deref(), parent)
        .await?;

    Ok(Json(ApiResponse::new(FileResponse::from(file))))
}

/// GET /api/files/:id/download - Stream the file content.
///
/// Chunked files are reassembled in chunk order.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> Result<Response<Body>, ApiError> {
    let plan = state.resolver.resolve(file_id).await?;
    let stream = state.resolver.stream(&plan);

    let content_type = mime_guess::from_path(&plan.filename)
        .first_or_octet_stream()
        .to_string();

    tracing::debug!(file_id, parts = plan.parts.len(), "Starting download");

    let response = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&plan.filename),
        )
        .header(header::CONTENT_LENGTH, plan.total_size)
        .body(Body::from_stream(stream))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}

/// GET /api/sessions/:id - Progress of a chunked upload.
pub async fn session_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionStatusResponse>>, ApiError> {
    let status = state.resolver.session_status(&session_id).await?;
    Ok(Json(ApiResponse::new(SessionStatusResponse::from(status))))
}
