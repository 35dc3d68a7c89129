//! Upload orchestration.
//!
//! Every blob is handed to the transport first; its metadata record is
//! written only after the transport acknowledged it. A failed insert after a
//! successful upload is reported as [`DriveError::OrphanedBlob`].

use std::sync::Arc;

use bytes::Bytes;
use sqlx::SqlitePool;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::plan::{ChunkPlan, ChunkRange, MAX_CHUNKS};
use crate::config::{UploadConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_BLOB_SIZE};
use crate::file::{
    validate_filename, ChunkRef, FileFilter, FileRecord, FileRepository, FileSort,
    FolderRepository, NewFile,
};
use crate::transport::{BlobReceipt, BlobTransport};
use crate::{DriveError, Result};

/// Size limits applied before anything reaches the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Chunk size for chunked uploads.
    pub chunk_size: u64,
    /// Per-message ceiling of the external store.
    pub max_blob_size: u64,
}

impl UploadLimits {
    /// Limits from the `[upload]` configuration section.
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            chunk_size: config.chunk_size_bytes,
            max_blob_size: config.max_blob_size_bytes,
        }
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
        }
    }
}

/// One client-sent chunk of a client-driven chunked upload.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    /// Filename of the logical file.
    pub filename: String,
    /// Session shared by all chunks of the file.
    pub session_id: String,
    /// Position of this chunk.
    pub chunk_index: i64,
    /// Number of chunks in the session.
    pub total_chunks: i64,
    /// Logical size of the whole file, when the client sent it.
    pub total_size: Option<i64>,
    /// Parent folder (None = root).
    pub parent_folder_id: Option<i64>,
    /// Chunk bytes.
    pub content: Bytes,
}

/// Progress notification emitted after each stored chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Chunks stored so far.
    pub completed: u64,
    /// Chunks in the plan.
    pub total: u64,
}

/// Outcome of a completed chunked upload.
#[derive(Debug, Clone)]
pub struct SessionResult {
    /// Upload session identifier.
    pub session_id: String,
    /// Number of chunks stored.
    pub total_chunks: u64,
    /// Logical file size in bytes.
    pub size: u64,
    /// Chunk records in index order.
    pub records: Vec<FileRecord>,
}

/// Label of a chunk blob in the external store.
pub fn chunk_label(filename: &str, chunk_index: u64) -> String {
    format!("{filename}_chunk_{chunk_index}")
}

/// Drives blob uploads and records their metadata.
#[derive(Clone)]
pub struct UploadOrchestrator {
    pool: SqlitePool,
    transport: Arc<dyn BlobTransport>,
    limits: UploadLimits,
}

impl UploadOrchestrator {
    /// Create a new orchestrator.
    ///
    /// The chunk size must be non-zero and must not exceed the blob ceiling.
    pub fn new(
        pool: SqlitePool,
        transport: Arc<dyn BlobTransport>,
        limits: UploadLimits,
    ) -> Result<Self> {
        if limits.chunk_size == 0 {
            return Err(DriveError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if limits.chunk_size > limits.max_blob_size {
            return Err(DriveError::Config(format!(
                "chunk size {} exceeds the blob ceiling {}",
                limits.chunk_size, limits.max_blob_size
            )));
        }

        Ok(Self {
            pool,
            transport,
            limits,
        })
    }

    /// Configured limits.
    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    /// Store a whole file as one blob.
    ///
    /// Exactly one transport call and, on success, one record insert.
    pub async fn upload_single(
        &self,
        content: Bytes,
        filename: &str,
        parent_folder_id: Option<i64>,
    ) -> Result<FileRecord> {
        validate_filename(filename)?;
        self.check_ceiling(content.len())?;
        self.check_parent(parent_folder_id).await?;

        let size = content.len() as i64;
        let receipt = self.transport.upload(content, filename).await?;

        let new_file = NewFile::single(
            filename,
            size,
            receipt.message_id,
            receipt.blob_id.clone(),
        )
        .with_parent(parent_folder_id);
        let record = self.record(&new_file, &receipt).await?;

        info!(
            file_id = record.id,
            message_id = receipt.message_id,
            size,
            "File uploaded"
        );
        Ok(record)
    }

    /// Store one chunk sent by a client that does its own splitting.
    pub async fn upload_chunk(&self, chunk: ChunkUpload) -> Result<FileRecord> {
        validate_filename(&chunk.filename)?;
        if chunk.session_id.trim().is_empty() {
            return Err(DriveError::Validation("session id is empty".to_string()));
        }
        if chunk.total_chunks < 1 {
            return Err(DriveError::Validation(
                "total chunks must be at least 1".to_string(),
            ));
        }
        if chunk.total_chunks as u64 > MAX_CHUNKS {
            return Err(DriveError::Validation(format!(
                "total chunks {} exceeds {MAX_CHUNKS}",
                chunk.total_chunks
            )));
        }
        if chunk.chunk_index < 0 || chunk.chunk_index >= chunk.total_chunks {
            return Err(DriveError::Validation(format!(
                "chunk index {} is outside [0, {})",
                chunk.chunk_index, chunk.total_chunks
            )));
        }
        if chunk.total_size.is_some_and(|size| size < 0) {
            return Err(DriveError::Validation(
                "total size must not be negative".to_string(),
            ));
        }
        self.check_ceiling(chunk.content.len())?;
        self.check_parent(chunk.parent_folder_id).await?;

        let siblings = FileRepository::new(&self.pool)
            .find(
                &FileFilter::new().session(chunk.session_id.clone()),
                FileSort::ChunkIndex,
            )
            .await?;
        for record in &siblings {
            if record.original_filename != chunk.filename {
                return Err(DriveError::Validation(format!(
                    "session {} belongs to {}, not {}",
                    chunk.session_id, record.original_filename, chunk.filename
                )));
            }
            if record.parent_folder_id != chunk.parent_folder_id {
                return Err(DriveError::Validation(format!(
                    "session {} is stored in another folder",
                    chunk.session_id
                )));
            }
            let Some(sibling) = record.chunk() else {
                continue;
            };
            if sibling.total_chunks != chunk.total_chunks {
                return Err(DriveError::Validation(format!(
                    "session {} declares {} chunks, not {}",
                    chunk.session_id, sibling.total_chunks, chunk.total_chunks
                )));
            }
            if sibling.chunk_index == chunk.chunk_index {
                return Err(DriveError::Validation(format!(
                    "chunk {} of session {} is already stored",
                    chunk.chunk_index, chunk.session_id
                )));
            }
        }

        let chunk_size = chunk.content.len() as i64;
        let label = chunk_label(&chunk.filename, chunk.chunk_index as u64);
        let receipt = self.transport.upload(chunk.content, &label).await?;

        let new_file = NewFile::chunk(
            chunk.filename,
            chunk.total_size.unwrap_or(0),
            ChunkRef {
                upload_session_id: chunk.session_id.clone(),
                chunk_index: chunk.chunk_index,
                total_chunks: chunk.total_chunks,
                message_id: receipt.message_id,
                blob_id: receipt.blob_id.clone(),
                chunk_size,
            },
        )
        .with_parent(chunk.parent_folder_id);
        let record = self.record(&new_file, &receipt).await?;

        debug!(
            session_id = %chunk.session_id,
            chunk_index = chunk.chunk_index,
            total_chunks = chunk.total_chunks,
            message_id = receipt.message_id,
            "Chunk stored"
        );
        Ok(record)
    }

    /// Split a stream into chunks and store them in index order.
    ///
    /// At most one chunk is held in memory. On the first failure the session
    /// stops with [`DriveError::SessionAborted`]; chunks stored before it keep
    /// their records. Dropping the returned future cancels the session the
    /// same way.
    ///
    /// `progress` receives `(completed, total)` after each stored chunk.
    pub async fn upload_chunked<R>(
        &self,
        reader: R,
        filename: &str,
        size: u64,
        parent_folder_id: Option<i64>,
        progress: Option<&UnboundedSender<UploadProgress>>,
    ) -> Result<SessionResult>
    where
        R: AsyncRead + Unpin + Send,
    {
        validate_filename(filename)?;
        if i64::try_from(size).is_err() {
            return Err(DriveError::Validation(format!("file size {size} is too large")));
        }
        self.check_parent(parent_folder_id).await?;

        let plan = ChunkPlan::new(size, self.limits.chunk_size)?;
        let total = plan.total_chunks();
        info!(
            session_id = %plan.session_id,
            filename,
            size,
            total_chunks = total,
            "Chunked upload started"
        );

        let mut reader = reader;
        let mut records = Vec::with_capacity(plan.ranges.len());
        for range in &plan.ranges {
            let stored = self
                .store_planned_chunk(&mut reader, &plan, range, filename, parent_folder_id)
                .await;

            match stored {
                Ok(record) => records.push(record),
                Err(cause) => {
                    warn!(
                        session_id = %plan.session_id,
                        chunk_index = range.index,
                        completed = records.len(),
                        total_chunks = total,
                        error = %cause,
                        "Chunked upload aborted"
                    );
                    return Err(DriveError::SessionAborted {
                        session_id: plan.session_id.clone(),
                        completed: records.len() as u64,
                        total_chunks: total,
                        cause: Box::new(cause),
                    });
                }
            }

            if let Some(tx) = progress {
                // A dropped receiver only means nobody is watching.
                let _ = tx.send(UploadProgress {
                    completed: records.len() as u64,
                    total,
                });
            }
        }

        info!(
            session_id = %plan.session_id,
            total_chunks = total,
            "Chunked upload complete"
        );
        Ok(SessionResult {
            session_id: plan.session_id,
            total_chunks: total,
            size,
            records,
        })
    }

    async fn store_planned_chunk<R>(
        &self,
        reader: &mut R,
        plan: &ChunkPlan,
        range: &ChunkRange,
        filename: &str,
        parent_folder_id: Option<i64>,
    ) -> Result<FileRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        let len = usize::try_from(range.len()).map_err(|_| {
            DriveError::Validation(format!("chunk of {} bytes does not fit in memory", range.len()))
        })?;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;

        let receipt = self
            .transport
            .upload(Bytes::from(buf), &chunk_label(filename, range.index))
            .await?;

        let new_file = NewFile::chunk(
            filename,
            plan.size as i64,
            ChunkRef {
                upload_session_id: plan.session_id.clone(),
                chunk_index: range.index as i64,
                total_chunks: plan.total_chunks() as i64,
                message_id: receipt.message_id,
                blob_id: receipt.blob_id.clone(),
                chunk_size: len as i64,
            },
        )
        .with_parent(parent_folder_id);
        let record = self.record(&new_file, &receipt).await?;

        debug!(
            session_id = %plan.session_id,
            chunk_index = range.index,
            message_id = receipt.message_id,
            "Chunk stored"
        );
        Ok(record)
    }

    async fn record(&self, new_file: &NewFile, receipt: &BlobReceipt) -> Result<FileRecord> {
        FileRepository::new(&self.pool)
            .create(new_file)
            .await
            .map_err(|e| {
                error!(
                    message_id = receipt.message_id,
                    blob_id = %receipt.blob_id,
                    error = %e,
                    "Blob stored but its record was not written"
                );
                DriveError::OrphanedBlob {
                    message_id: receipt.message_id,
                    blob_id: receipt.blob_id.clone(),
                    reason: e.to_string(),
                }
            })
    }

    fn check_ceiling(&self, len: usize) -> Result<()> {
        if len as u64 > self.limits.max_blob_size {
            return Err(DriveError::Validation(format!(
                "payload of {len} bytes exceeds the {} byte limit",
                self.limits.max_blob_size
            )));
        }
        Ok(())
    }

    async fn check_parent(&self, parent_folder_id: Option<i64>) -> Result<()> {
        if let Some(parent_id) = parent_folder_id {
            if !FolderRepository::new(&self.pool).exists(parent_id).await? {
                return Err(DriveError::Validation(format!(
                    "parent folder {parent_id} does not exist"
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for UploadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOrchestrator")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
