//! Public sharing for teledrive.
//!
//! A shared file carries an unguessable token; anyone holding the token can
//! download the file while it stays public. Disabling sharing removes the
//! token, so a later re-share mints a different one.

use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::file::{FileFilter, FileRecord, FileRepository};
use crate::{DriveError, Result};

/// Share state of a file after a toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareState {
    /// Whether the file is now public.
    pub is_public: bool,
    /// Share token, present iff public.
    pub token: Option<String>,
}

/// Issues, revokes and resolves share tokens.
#[derive(Clone)]
pub struct SharingManager {
    pool: SqlitePool,
}

impl SharingManager {
    /// Create a new SharingManager.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Flip the public flag of a file.
    ///
    /// Enabling mints a fresh random token; disabling clears it.
    pub async fn toggle_share(&self, file_id: i64) -> Result<ShareState> {
        let repo = FileRepository::new(&self.pool);
        let file = repo
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| DriveError::NotFound("file".to_string()))?;

        let token = if file.is_public {
            None
        } else {
            Some(Uuid::new_v4().to_string())
        };

        let updated = repo
            .set_share(file_id, token.as_deref())
            .await?
            .ok_or_else(|| DriveError::NotFound("file".to_string()))?;

        info!(file_id, is_public = updated.is_public, "Share toggled");
        Ok(ShareState {
            is_public: updated.is_public,
            token: updated.public_share_token,
        })
    }

    /// Resolve a share token to its file.
    ///
    /// Fails with `NotFound` unless a public record holds the token, and with
    /// `NotSupported` for chunked files.
    pub async fn resolve_token(&self, token: &str) -> Result<FileRecord> {
        let file = FileRepository::new(&self.pool)
            .find_one(&FileFilter::new().share_token(token).public(true))
            .await?
            .ok_or_else(|| DriveError::NotFound("shared file".to_string()))?;

        if file.is_chunked() {
            return Err(DriveError::NotSupported(
                "public links to chunked files".to_string(),
            ));
        }

        Ok(file)
    }
}

impl std::fmt::Debug for SharingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharingManager").finish()
    }
}
