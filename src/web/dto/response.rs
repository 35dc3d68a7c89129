//! Response DTOs for Web API.

use serde::Serialize;

use crate::datetime::to_rfc3339;
use crate::download::SessionStatus;
use crate::file::{FileRecord, Folder};
use crate::share::ShareState;

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// File record summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: i64,
    pub original_filename: String,
    pub original_file_size: i64,
    pub is_chunked: bool,
    pub parent_folder_id: Option<i64>,
    pub is_public: bool,
    pub public_share_token: Option<String>,
    pub upload_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<i64>,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        let upload_date = to_rfc3339(&file.upload_date);
        let chunk = file.chunk().cloned();
        Self {
            id: file.id,
            original_filename: file.original_filename,
            original_file_size: file.original_file_size,
            is_chunked: chunk.is_some(),
            parent_folder_id: file.parent_folder_id,
            is_public: file.is_public,
            public_share_token: file.public_share_token,
            upload_date,
            upload_session_id: chunk.as_ref().map(|c| c.upload_session_id.clone()),
            chunk_index: chunk.as_ref().map(|c| c.chunk_index),
            total_chunks: chunk.as_ref().map(|c| c.total_chunks),
        }
    }
}

/// Result of a single upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_id: i64,
    pub message_id: i64,
    pub blob_id: String,
    pub file: FileResponse,
}

/// Result of a chunk upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadResponse {
    pub chunk_record_id: i64,
    pub message_id_for_chunk: i64,
    pub session_id: String,
    pub chunk_index: i64,
    pub total_chunks: i64,
}

/// Share state after a toggle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub is_public: bool,
    pub token: Option<String>,
}

impl From<ShareState> for ShareResponse {
    fn from(state: ShareState) -> Self {
        Self {
            is_public: state.is_public,
            token: state.token,
        }
    }
}

/// Folder summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderResponse {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: String,
}

impl From<Folder> for FolderResponse {
    fn from(folder: Folder) -> Self {
        let created_at = to_rfc3339(&folder.created_at);
        Self {
            id: folder.id,
            name: folder.name,
            parent_id: folder.parent_id,
            created_at,
        }
    }
}

/// Upload session progress.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub received: i64,
    pub total_chunks: i64,
    pub complete: bool,
}

impl From<SessionStatus> for SessionStatusResponse {
    fn from(status: SessionStatus) -> Self {
        Self {
            session_id: status.session_id,
            received: status.received,
            total_chunks: status.total_chunks,
            complete: status.complete,
        }
    }
}
