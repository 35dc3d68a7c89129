//! File record types and repository.
//!
//! A logical file is either one record pointing at a single blob, or a set of
//! chunk fragments that share an upload session identifier.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::transport::BlobRef;
use crate::{DriveError, Result};

const FILE_COLUMNS: &str = "id, original_filename, original_file_size, is_chunked, message_id, \
     blob_id, upload_session_id, chunk_index, total_chunks, chunk_size, parent_folder_id, \
     is_public, public_share_token, upload_date";

/// Location of one chunk fragment within its upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRef {
    /// Session shared by all fragments of the logical file.
    pub upload_session_id: String,
    /// Position of this fragment, in `[0, total_chunks)`.
    pub chunk_index: i64,
    /// Number of fragments in the session.
    pub total_chunks: i64,
    /// Message holding this fragment.
    pub message_id: i64,
    /// Blob identifier of this fragment.
    pub blob_id: String,
    /// Byte length of this fragment.
    pub chunk_size: i64,
}

/// Where the bytes of a file record live in the external store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageRef {
    /// The whole file is one blob.
    Single {
        /// Message holding the blob.
        message_id: i64,
        /// Blob identifier.
        blob_id: String,
    },
    /// This record is one fragment of a chunked upload.
    Chunk(ChunkRef),
}

impl StorageRef {
    /// Reference used to fetch the blob behind this record.
    pub fn blob(&self) -> BlobRef {
        match self {
            StorageRef::Single {
                message_id,
                blob_id,
            } => BlobRef::new(*message_id, blob_id.clone()),
            StorageRef::Chunk(chunk) => BlobRef::new(chunk.message_id, chunk.blob_id.clone()),
        }
    }
}

/// A stored file record.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Unique record ID.
    pub id: i64,
    /// Original filename supplied by the uploader.
    pub original_filename: String,
    /// Logical size in bytes (the whole file, also for chunk fragments).
    pub original_file_size: i64,
    /// Storage reference.
    pub storage: StorageRef,
    /// Parent folder (None = root).
    pub parent_folder_id: Option<i64>,
    /// Whether the file is publicly shared.
    pub is_public: bool,
    /// Share token, present iff `is_public`.
    pub public_share_token: Option<String>,
    /// When the record was created (SQLite datetime, UTC).
    pub upload_date: String,
}

impl FileRecord {
    /// Whether this record is a chunk fragment.
    pub fn is_chunked(&self) -> bool {
        matches!(self.storage, StorageRef::Chunk(_))
    }

    /// Chunk placement, for chunk fragments.
    pub fn chunk(&self) -> Option<&ChunkRef> {
        match &self.storage {
            StorageRef::Chunk(chunk) => Some(chunk),
            StorageRef::Single { .. } => None,
        }
    }
}

/// Raw row as stored in the `files` table.
#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: i64,
    original_filename: String,
    original_file_size: i64,
    is_chunked: bool,
    message_id: i64,
    blob_id: String,
    upload_session_id: Option<String>,
    chunk_index: Option<i64>,
    total_chunks: Option<i64>,
    chunk_size: Option<i64>,
    parent_folder_id: Option<i64>,
    is_public: bool,
    public_share_token: Option<String>,
    upload_date: String,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = DriveError;

    fn try_from(row: FileRow) -> Result<Self> {
        let storage = if row.is_chunked {
            match (
                row.upload_session_id,
                row.chunk_index,
                row.total_chunks,
                row.chunk_size,
            ) {
                (Some(upload_session_id), Some(chunk_index), Some(total_chunks), Some(chunk_size)) => {
                    StorageRef::Chunk(ChunkRef {
                        upload_session_id,
                        chunk_index,
                        total_chunks,
                        message_id: row.message_id,
                        blob_id: row.blob_id,
                        chunk_size,
                    })
                }
                _ => {
                    return Err(DriveError::Database(format!(
                        "file {} is chunked but lacks chunk fields",
                        row.id
                    )))
                }
            }
        } else {
            StorageRef::Single {
                message_id: row.message_id,
                blob_id: row.blob_id,
            }
        };

        Ok(FileRecord {
            id: row.id,
            original_filename: row.original_filename,
            original_file_size: row.original_file_size,
            storage,
            parent_folder_id: row.parent_folder_id,
            is_public: row.is_public,
            public_share_token: row.public_share_token,
            upload_date: row.upload_date,
        })
    }
}

/// Data for creating a new file record.
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Original filename.
    pub original_filename: String,
    /// Logical file size in bytes.
    pub original_file_size: i64,
    /// Storage reference.
    pub storage: StorageRef,
    /// Parent folder (None = root).
    pub parent_folder_id: Option<i64>,
}

impl NewFile {
    /// A file stored as one blob.
    pub fn single(
        filename: impl Into<String>,
        size: i64,
        message_id: i64,
        blob_id: impl Into<String>,
    ) -> Self {
        Self {
            original_filename: filename.into(),
            original_file_size: size,
            storage: StorageRef::Single {
                message_id,
                blob_id: blob_id.into(),
            },
            parent_folder_id: None,
        }
    }

    /// One fragment of a chunked upload.
    pub fn chunk(filename: impl Into<String>, total_size: i64, chunk: ChunkRef) -> Self {
        Self {
            original_filename: filename.into(),
            original_file_size: total_size,
            storage: StorageRef::Chunk(chunk),
            parent_folder_id: None,
        }
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_folder_id: Option<i64>) -> Self {
        self.parent_folder_id = parent_folder_id;
        self
    }
}

/// Builder for updating a file record.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    /// New filename.
    pub original_filename: Option<String>,
    /// New parent folder.
    pub parent_folder_id: Option<Option<i64>>,
}

impl FileUpdate {
    /// Create a new FileUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filename.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.original_filename = Some(filename.into());
        self
    }

    /// Set the parent folder.
    pub fn parent_folder_id(mut self, parent_folder_id: Option<i64>) -> Self {
        self.parent_folder_id = Some(parent_folder_id);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.original_filename.is_none() && self.parent_folder_id.is_none()
    }
}

/// Typed query filter over file records. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    /// `Some(None)` selects root-level files.
    pub parent_folder_id: Option<Option<i64>>,
    pub upload_session_id: Option<String>,
    pub chunk_index: Option<i64>,
    pub is_chunked: Option<bool>,
    pub is_public: Option<bool>,
    pub public_share_token: Option<String>,
}

impl FileFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only files directly inside a folder (None = root).
    pub fn in_folder(mut self, folder_id: Option<i64>) -> Self {
        self.parent_folder_id = Some(folder_id);
        self
    }

    /// Only fragments of an upload session.
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.upload_session_id = Some(session_id.into());
        self
    }

    /// Only the fragment at a chunk index.
    pub fn chunk_index(mut self, index: i64) -> Self {
        self.chunk_index = Some(index);
        self
    }

    /// Only chunked or only unchunked records.
    pub fn chunked(mut self, is_chunked: bool) -> Self {
        self.is_chunked = Some(is_chunked);
        self
    }

    /// Only public or only private records.
    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }

    /// Only the record carrying a share token.
    pub fn share_token(mut self, token: impl Into<String>) -> Self {
        self.public_share_token = Some(token.into());
        self
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(parent) = self.parent_folder_id {
            match parent {
                Some(id) => {
                    query.push(" AND parent_folder_id = ").push_bind(id);
                }
                None => {
                    query.push(" AND parent_folder_id IS NULL");
                }
            }
        }
        if let Some(ref session_id) = self.upload_session_id {
            query
                .push(" AND upload_session_id = ")
                .push_bind(session_id.clone());
        }
        if let Some(index) = self.chunk_index {
            query.push(" AND chunk_index = ").push_bind(index);
        }
        if let Some(is_chunked) = self.is_chunked {
            query.push(" AND is_chunked = ").push_bind(is_chunked);
        }
        if let Some(is_public) = self.is_public {
            query.push(" AND is_public = ").push_bind(is_public);
        }
        if let Some(ref token) = self.public_share_token {
            query
                .push(" AND public_share_token = ")
                .push_bind(token.clone());
        }
    }
}

/// Result ordering for [`FileRepository::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSort {
    /// Most recent upload first.
    #[default]
    Newest,
    /// Ascending chunk index.
    ChunkIndex,
}

impl FileSort {
    fn order_clause(self) -> &'static str {
        match self {
            FileSort::Newest => " ORDER BY upload_date DESC, id DESC",
            FileSort::ChunkIndex => " ORDER BY chunk_index ASC, id ASC",
        }
    }
}

/// Repository for file record operations.
///
/// Every operation touches a single row, so each one is atomic on its own.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new file record.
    pub async fn create(&self, file: &NewFile) -> Result<FileRecord> {
        let query = match &file.storage {
            StorageRef::Single {
                message_id,
                blob_id,
            } => sqlx::query(
                "INSERT INTO files (original_filename, original_file_size, is_chunked,
                                    message_id, blob_id, parent_folder_id)
                 VALUES (?, ?, 0, ?, ?, ?)",
            )
            .bind(&file.original_filename)
            .bind(file.original_file_size)
            .bind(*message_id)
            .bind(blob_id)
            .bind(file.parent_folder_id),
            StorageRef::Chunk(chunk) => sqlx::query(
                "INSERT INTO files (original_filename, original_file_size, is_chunked,
                                    message_id, blob_id, upload_session_id, chunk_index,
                                    total_chunks, chunk_size, parent_folder_id)
                 VALUES (?, ?, 1, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&file.original_filename)
            .bind(file.original_file_size)
            .bind(chunk.message_id)
            .bind(&chunk.blob_id)
            .bind(&chunk.upload_session_id)
            .bind(chunk.chunk_index)
            .bind(chunk.total_chunks)
            .bind(chunk.chunk_size)
            .bind(file.parent_folder_id),
        };

        let result = query
            .execute(self.pool)
            .await
            .map_err(|e| DriveError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DriveError::NotFound("file".to_string()))
    }

    /// Get a file record by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DriveError::Database(e.to_string()))?;

        row.map(FileRecord::try_from).transpose()
    }

    /// Find records matching a filter.
    pub async fn find(&self, filter: &FileFilter, sort: FileSort) -> Result<Vec<FileRecord>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {FILE_COLUMNS} FROM files WHERE 1 = 1"));
        filter.push_conditions(&mut query);
        query.push(sort.order_clause());

        let rows = query
            .build_query_as::<FileRow>()
            .fetch_all(self.pool)
            .await
            .map_err(|e| DriveError::Database(e.to_string()))?;

        rows.into_iter().map(FileRecord::try_from).collect()
    }

    /// Find the first record matching a filter.
    pub async fn find_one(&self, filter: &FileFilter) -> Result<Option<FileRecord>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {FILE_COLUMNS} FROM files WHERE 1 = 1"));
        filter.push_conditions(&mut query);
        query.push(" LIMIT 1");

        let row = query
            .build_query_as::<FileRow>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DriveError::Database(e.to_string()))?;

        row.map(FileRecord::try_from).transpose()
    }

    /// Count records matching a filter.
    pub async fn count(&self, filter: &FileFilter) -> Result<i64> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM files WHERE 1 = 1");
        filter.push_conditions(&mut query);

        let count: i64 = query
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await
            .map_err(|e| DriveError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Set or clear the share token of a record.
    ///
    /// `Some(token)` makes the file public; `None` makes it private and
    /// removes the token (stored as NULL).
    pub async fn set_share(&self, id: i64, token: Option<&str>) -> Result<Option<FileRecord>> {
        let result = sqlx::query(
            "UPDATE files SET is_public = ?, public_share_token = ? WHERE id = ?",
        )
        .bind(token.is_some())
        .bind(token)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| DriveError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Update a file record.
    pub async fn update(&self, id: i64, update: &FileUpdate) -> Result<Option<FileRecord>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE files SET ");
        let mut separated = query.separated(", ");

        if let Some(ref filename) = update.original_filename {
            separated.push("original_filename = ");
            separated.push_bind_unseparated(filename.clone());
        }

        if let Some(parent_folder_id) = update.parent_folder_id {
            separated.push("parent_folder_id = ");
            separated.push_bind_unseparated(parent_folder_id);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| DriveError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }
}
