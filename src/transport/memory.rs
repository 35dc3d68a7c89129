//! In-process blob transport.
//!
//! Keeps blobs in memory and can be told to fail or stall specific upload
//! calls. Used by tests and for running the server without a bot.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use super::{BlobReceipt, BlobRef, BlobTransport, ByteStream};
use crate::{DriveError, Result};

/// Size of the pieces a fetched blob is streamed in.
const FETCH_PIECE_SIZE: usize = 64 * 1024;

#[derive(Debug, Default)]
struct MemoryState {
    next_message_id: i64,
    blobs: HashMap<String, Bytes>,
    labels: Vec<String>,
    upload_calls: usize,
    fail_on: HashSet<usize>,
    hang_on: HashSet<usize>,
}

enum UploadOutcome {
    Stored(BlobReceipt),
    Fail(usize),
    Hang,
}

/// Blob transport backed by a process-local map.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the upload call with this zero-based ordinal fail.
    pub fn fail_upload_on(self, call: usize) -> Self {
        self.lock().fail_on.insert(call);
        self
    }

    /// Make the upload call with this zero-based ordinal never complete.
    pub fn hang_upload_on(self, call: usize) -> Self {
        self.lock().hang_on.insert(call);
        self
    }

    /// Number of upload calls made so far, failed ones included.
    pub fn upload_calls(&self) -> usize {
        self.lock().upload_calls
    }

    /// Labels of successfully stored blobs, in upload order.
    pub fn labels(&self) -> Vec<String> {
        self.lock().labels.clone()
    }

    /// Number of stored blobs.
    pub fn blob_count(&self) -> usize {
        self.lock().blobs.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobTransport for MemoryTransport {
    async fn upload(&self, payload: Bytes, label: &str) -> Result<BlobReceipt> {
        let outcome = {
            let mut state = self.lock();
            let call = state.upload_calls;
            state.upload_calls += 1;

            if state.fail_on.contains(&call) {
                UploadOutcome::Fail(call)
            } else if state.hang_on.contains(&call) {
                UploadOutcome::Hang
            } else {
                state.next_message_id += 1;
                let message_id = state.next_message_id;
                let blob_id = format!("mem-{message_id}");
                state.blobs.insert(blob_id.clone(), payload);
                state.labels.push(label.to_string());
                UploadOutcome::Stored(BlobReceipt {
                    message_id,
                    blob_id,
                })
            }
        };

        match outcome {
            UploadOutcome::Stored(receipt) => Ok(receipt),
            UploadOutcome::Fail(call) => Err(DriveError::Transport(format!(
                "injected failure on upload call {call}"
            ))),
            UploadOutcome::Hang => std::future::pending().await,
        }
    }

    async fn fetch(&self, blob: &BlobRef) -> Result<ByteStream> {
        let content = self
            .lock()
            .blobs
            .get(&blob.blob_id)
            .cloned()
            .ok_or_else(|| DriveError::Transport(format!("unknown blob {}", blob.blob_id)))?;

        let pieces: Vec<Result<Bytes>> = if content.is_empty() {
            Vec::new()
        } else {
            content
                .chunks(FETCH_PIECE_SIZE)
                .map(|piece| Ok(content.slice_ref(piece)))
                .collect()
        };

        Ok(Box::pin(stream::iter(pieces)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn read_all(transport: &MemoryTransport, blob: &BlobRef) -> Vec<u8> {
        let pieces: Vec<Bytes> = transport
            .fetch(blob)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        pieces.concat()
    }

    #[tokio::test]
    async fn test_upload_and_fetch() {
        let transport = MemoryTransport::new();

        let receipt = transport
            .upload(Bytes::from_static(b"hello"), "hello.txt")
            .await
            .unwrap();
        assert_eq!(receipt.message_id, 1);

        let content = read_all(&transport, &receipt.clone().into()).await;
        assert_eq!(content, b"hello");
        assert_eq!(transport.labels(), vec!["hello.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_large_blob_streams_in_pieces() {
        let transport = MemoryTransport::new();
        let payload: Vec<u8> = (0..(FETCH_PIECE_SIZE * 2 + 5)).map(|i| i as u8).collect();

        let receipt = transport
            .upload(Bytes::from(payload.clone()), "big")
            .await
            .unwrap();
        let pieces: Vec<Bytes> = transport
            .fetch(&receipt.into())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces.concat(), payload);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let transport = MemoryTransport::new().fail_upload_on(1);

        assert!(transport.upload(Bytes::new(), "a").await.is_ok());
        let err = transport.upload(Bytes::new(), "b").await.unwrap_err();
        assert!(matches!(err, DriveError::Transport(_)));
        assert!(transport.upload(Bytes::new(), "c").await.is_ok());

        assert_eq!(transport.upload_calls(), 3);
        assert_eq!(transport.blob_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_unknown_blob() {
        let transport = MemoryTransport::new();
        let result = transport.fetch(&BlobRef::new(1, "missing")).await;
        assert!(matches!(result, Err(DriveError::Transport(_))));
    }
}
