//! API error handling for the teledrive HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::DriveError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Not found (404).
    NotFound,
    /// Upload session still missing chunks (409).
    IncompleteUpload,
    /// Blob stored without a metadata record (500).
    OrphanedBlob,
    /// External blob store failure (500).
    TransportError,
    /// Internal server error (500).
    InternalError,
    /// Not implemented for this resource (501).
    NotImplemented,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::IncompleteUpload => StatusCode::CONFLICT,
            ErrorCode::OrphanedBlob => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::TransportError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<DriveError> for ApiError {
    fn from(err: DriveError) -> Self {
        // An aborted session is reported by what stopped it.
        let code = match err.root_cause() {
            DriveError::Validation(_) => ErrorCode::BadRequest,
            DriveError::NotFound(_) => ErrorCode::NotFound,
            DriveError::IncompleteUpload { .. } => ErrorCode::IncompleteUpload,
            DriveError::NotSupported(_) => ErrorCode::NotImplemented,
            DriveError::OrphanedBlob { .. } => ErrorCode::OrphanedBlob,
            DriveError::Transport(_) => ErrorCode::TransportError,
            _ => ErrorCode::InternalError,
        };

        match code {
            ErrorCode::InternalError => {
                tracing::error!("Internal error: {}", err);
                ApiError::internal("An internal error occurred")
            }
            ErrorCode::TransportError | ErrorCode::OrphanedBlob => {
                tracing::error!("Upload failed: {}", err);
                ApiError::new(code, err.to_string())
            }
            _ => ApiError::new(code, err.to_string()),
        }
    }
}
