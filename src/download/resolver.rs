//! Reconstruction of stored files.
//!
//! A single-blob file is one fetch. A chunked file is every fragment of its
//! upload session fetched in index order and concatenated; the session must
//! cover `[0, total_chunks)` exactly once or the file is not ready.

use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};
use sqlx::SqlitePool;
use tracing::debug;

use crate::file::{FileFilter, FileRecord, FileRepository, FileSort, StorageRef};
use crate::transport::{BlobRef, BlobTransport, ByteStream};
use crate::{DriveError, Result};

/// One fetch in a download plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPart {
    /// Position of the part in the output.
    pub index: u64,
    /// Blob to fetch.
    pub blob: BlobRef,
    /// Byte length of the part.
    pub size: u64,
}

/// Ordered fetches that reproduce a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    /// Record the download was requested for.
    pub file_id: i64,
    /// Filename to present.
    pub filename: String,
    /// Total byte length of the reconstructed file.
    pub total_size: u64,
    /// Parts in output order.
    pub parts: Vec<FetchPart>,
}

impl DownloadPlan {
    /// Whether the file is made of more than one record.
    pub fn is_chunked(&self) -> bool {
        self.parts.len() > 1
    }
}

/// Progress of an upload session as seen by the metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Upload session identifier.
    pub session_id: String,
    /// Chunk records present.
    pub received: i64,
    /// Chunks the session declares.
    pub total_chunks: i64,
    /// Whether every chunk index is present.
    pub complete: bool,
}

/// Turns file identifiers into fetch plans and byte streams.
#[derive(Clone)]
pub struct ReconstructionResolver {
    pool: SqlitePool,
    transport: Arc<dyn BlobTransport>,
}

impl ReconstructionResolver {
    /// Create a new resolver.
    pub fn new(pool: SqlitePool, transport: Arc<dyn BlobTransport>) -> Self {
        Self { pool, transport }
    }

    /// Build the download plan for a file record.
    ///
    /// Any fragment of a chunked file resolves to the whole file.
    pub async fn resolve(&self, file_id: i64) -> Result<DownloadPlan> {
        let record = FileRepository::new(&self.pool)
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| DriveError::NotFound("file".to_string()))?;

        self.plan_for(record).await
    }

    /// Build the download plan for an already loaded record.
    pub async fn plan_for(&self, record: FileRecord) -> Result<DownloadPlan> {
        let chunk = match &record.storage {
            StorageRef::Single {
                message_id,
                blob_id,
            } => {
                return Ok(DownloadPlan {
                    file_id: record.id,
                    filename: record.original_filename.clone(),
                    total_size: record.original_file_size as u64,
                    parts: vec![FetchPart {
                        index: 0,
                        blob: BlobRef::new(*message_id, blob_id.clone()),
                        size: record.original_file_size as u64,
                    }],
                });
            }
            StorageRef::Chunk(chunk) => chunk,
        };

        let siblings = self.session_chunks(&chunk.upload_session_id).await?;
        let incomplete = || DriveError::IncompleteUpload {
            session_id: chunk.upload_session_id.clone(),
            expected: chunk.total_chunks,
            found: siblings.len() as i64,
        };

        if siblings.len() as i64 != chunk.total_chunks {
            return Err(incomplete());
        }

        let mut parts = Vec::with_capacity(siblings.len());
        for (position, sibling) in siblings.iter().enumerate() {
            let placement = sibling.chunk().ok_or_else(incomplete)?;
            if placement.chunk_index != position as i64
                || placement.total_chunks != chunk.total_chunks
            {
                return Err(incomplete());
            }
            parts.push(FetchPart {
                index: position as u64,
                blob: sibling.storage.blob(),
                size: placement.chunk_size as u64,
            });
        }

        debug!(
            file_id = record.id,
            session_id = %chunk.upload_session_id,
            parts = parts.len(),
            "Resolved chunked file"
        );

        Ok(DownloadPlan {
            file_id: record.id,
            filename: record.original_filename.clone(),
            total_size: parts.iter().map(|p| p.size).sum(),
            parts,
        })
    }

    /// Report how many chunks of a session are recorded.
    pub async fn session_status(&self, session_id: &str) -> Result<SessionStatus> {
        let siblings = self.session_chunks(session_id).await?;
        let total_chunks = siblings
            .iter()
            .filter_map(FileRecord::chunk)
            .map(|c| c.total_chunks)
            .max()
            .ok_or_else(|| DriveError::NotFound("upload session".to_string()))?;

        let received = siblings.len() as i64;
        let complete = received == total_chunks
            && siblings
                .iter()
                .filter_map(FileRecord::chunk)
                .enumerate()
                .all(|(position, c)| c.chunk_index == position as i64);

        Ok(SessionStatus {
            session_id: session_id.to_string(),
            received,
            total_chunks,
            complete,
        })
    }

    /// Stream the bytes of a plan, fetching parts one after another.
    pub fn stream(&self, plan: &DownloadPlan) -> ByteStream {
        let transport = self.transport.clone();
        let parts = plan.parts.clone();

        let stream = stream::iter(parts)
            .then(move |part| {
                let transport = transport.clone();
                async move { transport.fetch(&part.blob).await }
            })
            .try_flatten();

        Box::pin(stream)
    }

    async fn session_chunks(&self, session_id: &str) -> Result<Vec<FileRecord>> {
        FileRepository::new(&self.pool)
            .find(
                &FileFilter::new().session(session_id).chunked(true),
                FileSort::ChunkIndex,
            )
            .await
    }
}

impl std::fmt::Debug for ReconstructionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconstructionResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{ChunkRef, NewFile};
    use crate::transport::MemoryTransport;
    use crate::upload::{UploadLimits, UploadOrchestrator};
    use crate::Database;
    use bytes::Bytes;

    struct Fixture {
        db: Database,
        orchestrator: UploadOrchestrator,
        resolver: ReconstructionResolver,
    }

    async fn setup(transport: MemoryTransport, chunk_size: u64) -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let transport: Arc<dyn BlobTransport> = Arc::new(transport);
        let orchestrator = UploadOrchestrator::new(
            db.pool().clone(),
            transport.clone(),
            UploadLimits {
                chunk_size,
                max_blob_size: chunk_size,
            },
        )
        .unwrap();
        let resolver = ReconstructionResolver::new(db.pool().clone(), transport);
        Fixture {
            db,
            orchestrator,
            resolver,
        }
    }

    async fn read_all(resolver: &ReconstructionResolver, plan: &DownloadPlan) -> Vec<u8> {
        let pieces: Vec<Bytes> = resolver.stream(plan).try_collect().await.unwrap();
        pieces.concat()
    }

    #[tokio::test]
    async fn test_resolve_single() {
        let fx = setup(MemoryTransport::new(), 64).await;
        let record = fx
            .orchestrator
            .upload_single(Bytes::from_static(b"single blob"), "one.txt", None)
            .await
            .unwrap();

        let plan = fx.resolver.resolve(record.id).await.unwrap();
        assert_eq!(plan.parts.len(), 1);
        assert!(!plan.is_chunked());
        assert_eq!(plan.total_size, 11);
        assert_eq!(read_all(&fx.resolver, &plan).await, b"single blob");
    }

    #[tokio::test]
    async fn test_round_trip_chunked() {
        for (size, chunk_size) in [(10usize, 5u64), (10, 3), (1, 4), (17, 1)] {
            let fx = setup(MemoryTransport::new(), chunk_size).await;
            let content: Vec<u8> = (0..size).map(|i| (i * 31 % 251) as u8).collect();

            let result = fx
                .orchestrator
                .upload_chunked(&content[..], "data.bin", size as u64, None, None)
                .await
                .unwrap();

            // Any fragment resolves to the whole file.
            let last = result.records.last().unwrap().id;
            let plan = fx.resolver.resolve(last).await.unwrap();
            assert_eq!(plan.total_size, size as u64);
            assert_eq!(plan.parts.len() as u64, result.total_chunks);
            assert_eq!(read_all(&fx.resolver, &plan).await, content, "size {size}");
        }
    }

    #[tokio::test]
    async fn test_failed_chunk_leaves_incomplete_session() {
        let fx = setup(MemoryTransport::new().fail_upload_on(2), 4).await;
        let content = vec![1u8; 12];

        let err = fx
            .orchestrator
            .upload_chunked(&content[..], "broken.bin", 12, None, None)
            .await
            .unwrap_err();
        let session_id = match err {
            DriveError::SessionAborted {
                session_id,
                completed,
                total_chunks,
                ..
            } => {
                assert_eq!(completed, 2);
                assert_eq!(total_chunks, 3);
                session_id
            }
            other => panic!("expected SessionAborted, got {other:?}"),
        };

        let fragments = FileRepository::new(fx.db.pool())
            .find(
                &FileFilter::new().session(session_id.clone()),
                FileSort::ChunkIndex,
            )
            .await
            .unwrap();
        let indices: Vec<i64> = fragments
            .iter()
            .map(|f| f.chunk().unwrap().chunk_index)
            .collect();
        assert_eq!(indices, vec![0, 1]);

        let err = fx.resolver.resolve(fragments[0].id).await.unwrap_err();
        assert!(matches!(
            err,
            DriveError::IncompleteUpload {
                expected: 3,
                found: 2,
                ..
            }
        ));

        let status = fx.resolver.session_status(&session_id).await.unwrap();
        assert_eq!(status.received, 2);
        assert_eq!(status.total_chunks, 3);
        assert!(!status.complete);
    }

    #[tokio::test]
    async fn test_gap_in_indices_is_incomplete() {
        let fx = setup(MemoryTransport::new(), 4).await;
        let repo = FileRepository::new(fx.db.pool());

        let mut last = None;
        for index in [0, 2] {
            let record = repo
                .create(&NewFile::chunk(
                    "gap.bin",
                    8,
                    ChunkRef {
                        upload_session_id: "gap".to_string(),
                        chunk_index: index,
                        total_chunks: 3,
                        message_id: index,
                        blob_id: format!("b{index}"),
                        chunk_size: 4,
                    },
                ))
                .await
                .unwrap();
            last = Some(record.id);
        }

        let result = fx.resolver.resolve(last.unwrap()).await;
        assert!(matches!(result, Err(DriveError::IncompleteUpload { .. })));
    }

    #[tokio::test]
    async fn test_session_status_complete() {
        let fx = setup(MemoryTransport::new(), 2).await;
        let result = fx
            .orchestrator
            .upload_chunked(&b"abcde"[..], "x.txt", 5, None, None)
            .await
            .unwrap();

        let status = fx.resolver.session_status(&result.session_id).await.unwrap();
        assert_eq!(status.received, 3);
        assert!(status.complete);

        assert!(matches!(
            fx.resolver.session_status("nope").await,
            Err(DriveError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_missing_file() {
        let fx = setup(MemoryTransport::new(), 4).await;
        assert!(matches!(
            fx.resolver.resolve(1).await,
            Err(DriveError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_surfaces_transport_errors() {
        let fx = setup(MemoryTransport::new(), 4).await;
        let record = FileRepository::new(fx.db.pool())
            .create(&NewFile::single("ghost.txt", 3, 9, "never-uploaded"))
            .await
            .unwrap();

        let plan = fx.resolver.resolve(record.id).await.unwrap();
        let result: Result<Vec<Bytes>> = fx.resolver.stream(&plan).try_collect().await;
        assert!(matches!(result, Err(DriveError::Transport(_))));
    }
}
