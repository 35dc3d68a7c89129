//! Blob transport to the external message store.
//!
//! A transport deposits one binary payload as one message and hands back the
//! identifiers needed to fetch it again. It never retries; retry policy
//! belongs to the caller.

mod memory;
mod telegram;

pub use memory::MemoryTransport;
pub use telegram::{parse_file_path_response, parse_send_response, TelegramTransport};

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::Result;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Acknowledgement of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobReceipt {
    /// Identifier of the message carrying the blob.
    pub message_id: i64,
    /// Store-specific blob identifier.
    pub blob_id: String,
}

/// Address of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// Identifier of the message carrying the blob.
    pub message_id: i64,
    /// Store-specific blob identifier.
    pub blob_id: String,
}

impl BlobRef {
    /// Create a new blob reference.
    pub fn new(message_id: i64, blob_id: impl Into<String>) -> Self {
        Self {
            message_id,
            blob_id: blob_id.into(),
        }
    }
}

impl From<BlobReceipt> for BlobRef {
    fn from(receipt: BlobReceipt) -> Self {
        Self {
            message_id: receipt.message_id,
            blob_id: receipt.blob_id,
        }
    }
}

/// Uploads and fetches opaque blobs.
///
/// Implementations report network failures, rejected requests and malformed
/// acknowledgements as [`DriveError::Transport`](crate::DriveError::Transport).
/// Size ceilings are enforced by the caller.
#[async_trait]
pub trait BlobTransport: Send + Sync {
    /// Store one payload under a human-readable label.
    async fn upload(&self, payload: Bytes, label: &str) -> Result<BlobReceipt>;

    /// Stream a stored blob back.
    async fn fetch(&self, blob: &BlobRef) -> Result<ByteStream>;
}
