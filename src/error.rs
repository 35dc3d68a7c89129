//! Error types for teledrive.

use thiserror::Error;

/// Common error type for teledrive.
#[derive(Error, Debug)]
pub enum DriveError {
    /// Validation error for caller input. No side effects were performed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The external blob store was unreachable, rejected the request, or replied
    /// with something we could not interpret.
    #[error("transport error: {0}")]
    Transport(String),

    /// Metadata store error.
    ///
    /// Errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// The blob was acknowledged by the transport but its metadata record could
    /// not be written. The blob stays in the external store without a record.
    #[error("blob {blob_id} (message {message_id}) stored but not recorded: {reason}")]
    OrphanedBlob {
        /// Message identifier of the orphaned blob.
        message_id: i64,
        /// Store-specific blob identifier.
        blob_id: String,
        /// Why the metadata insert failed.
        reason: String,
    },

    /// A chunked upload does not (yet) cover every chunk index exactly once.
    #[error("upload session {session_id} is incomplete: {found} of {expected} chunks present")]
    IncompleteUpload {
        /// Upload session identifier.
        session_id: String,
        /// Number of chunks the session declares.
        expected: i64,
        /// Number of usable chunk records found.
        found: i64,
    },

    /// A chunked upload stopped before all chunks were stored.
    #[error("upload session {session_id} aborted after {completed}/{total_chunks} chunks: {cause}")]
    SessionAborted {
        /// Upload session identifier.
        session_id: String,
        /// Chunks stored before the failure.
        completed: u64,
        /// Chunks in the plan.
        total_chunks: u64,
        /// The failure that stopped the session.
        cause: Box<DriveError>,
    },

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Operation is not supported for this resource.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DriveError {
    /// The innermost error, looking through aborted sessions.
    pub fn root_cause(&self) -> &DriveError {
        match self {
            DriveError::SessionAborted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for DriveError {
    fn from(e: sqlx::Error) -> Self {
        DriveError::Database(e.to_string())
    }
}

/// Result type alias for teledrive operations.
pub type Result<T> = std::result::Result<T, DriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = DriveError::Validation("filename is empty".to_string());
        assert_eq!(err.to_string(), "validation error: filename is empty");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = DriveError::NotFound("file".to_string());
        assert_eq!(err.to_string(), "file not found");
    }

    #[test]
    fn test_incomplete_upload_display() {
        let err = DriveError::IncompleteUpload {
            session_id: "abc".to_string(),
            expected: 3,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "upload session abc is incomplete: 2 of 3 chunks present"
        );
    }

    #[test]
    fn test_orphaned_blob_display() {
        let err = DriveError::OrphanedBlob {
            message_id: 42,
            blob_id: "BQAD".to_string(),
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("message 42"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_root_cause_unwraps_session_abort() {
        let err = DriveError::SessionAborted {
            session_id: "s".to_string(),
            completed: 1,
            total_chunks: 3,
            cause: Box::new(DriveError::Transport("timeout".to_string())),
        };
        assert!(matches!(err.root_cause(), DriveError::Transport(_)));

        let plain = DriveError::NotFound("file".to_string());
        assert!(matches!(plain.root_cause(), DriveError::NotFound(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DriveError = io_err.into();
        assert!(matches!(err, DriveError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(DriveError::Transport("test".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
