//! Library service for teledrive.
//!
//! This module provides the folder and listing operations:
//! - Create, rename and move folders while keeping the tree acyclic
//! - List folders and files of one level
//! - Look up single file records

use sqlx::SqlitePool;
use tracing::info;

use crate::{DriveError, Result};

use super::folder::{Folder, FolderRepository, FolderUpdate, NewFolder};
use super::metadata::{FileFilter, FileRecord, FileRepository, FileSort, FileUpdate};
use super::{validate_filename, validate_folder_name, MAX_FOLDER_DEPTH};

/// Folder and listing operations over the metadata store.
#[derive(Clone)]
pub struct LibraryService {
    pool: SqlitePool,
}

impl LibraryService {
    /// Create a new LibraryService.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a folder under `parent_id` (None = root).
    pub async fn create_folder(&self, name: &str, parent_id: Option<i64>) -> Result<Folder> {
        validate_folder_name(name)?;
        let repo = FolderRepository::new(&self.pool);

        if let Some(parent_id) = parent_id {
            self.check_move_target(&repo, parent_id, 0).await?;
        }

        let folder = repo
            .create(&NewFolder::new(name.trim()).with_parent(parent_id))
            .await?;
        info!(folder_id = folder.id, parent_id = ?parent_id, "Folder created");
        Ok(folder)
    }

    /// Rename a folder.
    pub async fn rename_folder(&self, folder_id: i64, name: &str) -> Result<Folder> {
        validate_folder_name(name)?;

        FolderRepository::new(&self.pool)
            .update(folder_id, &FolderUpdate::new().name(name.trim()))
            .await?
            .ok_or_else(|| DriveError::NotFound("folder".to_string()))
    }

    /// Move a folder under a new parent (None = root).
    ///
    /// Fails if the target is the folder itself or one of its descendants.
    pub async fn move_folder(&self, folder_id: i64, parent_id: Option<i64>) -> Result<Folder> {
        let repo = FolderRepository::new(&self.pool);

        if !repo.exists(folder_id).await? {
            return Err(DriveError::NotFound("folder".to_string()));
        }

        if let Some(parent_id) = parent_id {
            if parent_id == folder_id {
                return Err(DriveError::Validation(
                    "a folder cannot be its own parent".to_string(),
                ));
            }

            let parent_path = repo.get_path(parent_id).await?;
            if parent_path.iter().any(|f| f.id == folder_id) {
                return Err(DriveError::Validation(
                    "a folder cannot be moved into its own descendant".to_string(),
                ));
            }

            let height = repo.subtree_height(folder_id).await?;
            self.check_move_target(&repo, parent_id, height).await?;
        }

        let moved = repo
            .update(folder_id, &FolderUpdate::new().parent_id(parent_id))
            .await?
            .ok_or_else(|| DriveError::NotFound("folder".to_string()))?;
        info!(folder_id, parent_id = ?parent_id, "Folder moved");
        Ok(moved)
    }

    /// List the folders directly under `parent_id` (None = root).
    pub async fn list_folders(&self, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        let repo = FolderRepository::new(&self.pool);
        match parent_id {
            Some(parent_id) => {
                self.require_folder(parent_id).await?;
                repo.list_by_parent(parent_id).await
            }
            None => repo.list_root().await,
        }
    }

    /// List the files directly under `parent_id` (None = root), newest first.
    ///
    /// Chunk fragments are internal and never listed.
    pub async fn list_files(&self, parent_id: Option<i64>) -> Result<Vec<FileRecord>> {
        if let Some(parent_id) = parent_id {
            self.require_folder(parent_id).await?;
        }

        FileRepository::new(&self.pool)
            .find(
                &FileFilter::new().in_folder(parent_id).chunked(false),
                FileSort::Newest,
            )
            .await
    }

    /// Get a file record.
    pub async fn get_file(&self, file_id: i64) -> Result<FileRecord> {
        FileRepository::new(&self.pool)
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| DriveError::NotFound("file".to_string()))
    }

    /// Rename and/or move a file. `parent_id` of `Some(None)` moves it to
    /// the root.
    ///
    /// For a chunked file every fragment of its upload session is updated,
    /// one record at a time.
    pub async fn update_file(
        &self,
        file_id: i64,
        name: Option<&str>,
        parent_id: Option<Option<i64>>,
    ) -> Result<FileRecord> {
        let repo = FileRepository::new(&self.pool);
        let file = self.get_file(file_id).await?;

        let mut update = FileUpdate::new();
        if let Some(name) = name {
            validate_filename(name)?;
            update = update.filename(name.trim());
        }
        if let Some(parent_id) = parent_id {
            if let Some(folder_id) = parent_id {
                if !FolderRepository::new(&self.pool).exists(folder_id).await? {
                    return Err(DriveError::Validation(format!(
                        "parent folder {folder_id} does not exist"
                    )));
                }
            }
            update = update.parent_folder_id(parent_id);
        }

        let targets: Vec<i64> = match file.chunk() {
            Some(chunk) => repo
                .find(
                    &FileFilter::new().session(chunk.upload_session_id.clone()),
                    FileSort::ChunkIndex,
                )
                .await?
                .into_iter()
                .map(|f| f.id)
                .collect(),
            None => vec![file_id],
        };
        for id in &targets {
            repo.update(*id, &update).await?;
        }

        info!(file_id, records = targets.len(), "File updated");
        self.get_file(file_id).await
    }

    async fn require_folder(&self, folder_id: i64) -> Result<()> {
        if FolderRepository::new(&self.pool).exists(folder_id).await? {
            Ok(())
        } else {
            Err(DriveError::NotFound("folder".to_string()))
        }
    }

    /// Check that a subtree `height` levels tall fits under `parent_id`.
    async fn check_move_target(
        &self,
        repo: &FolderRepository<'_>,
        parent_id: i64,
        height: usize,
    ) -> Result<()> {
        if !repo.exists(parent_id).await? {
            return Err(DriveError::Validation(format!(
                "parent folder {parent_id} does not exist"
            )));
        }

        // Depth of the deepest folder after the move, 0-based.
        let parent_depth = repo.get_depth(parent_id).await?;
        if parent_depth + 1 + height >= MAX_FOLDER_DEPTH {
            return Err(DriveError::Validation(format!(
                "folders nest at most {MAX_FOLDER_DEPTH} levels deep"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for LibraryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryService").finish()
    }
}
