//! teledrive - file drive on top of a Telegram channel
//!
//! Files are stored as documents posted to a channel. Large files are split
//! into chunks, each chunk one message. A SQLite metadata store keeps the
//! folder tree, the file records and share tokens.

pub mod config;
pub mod datetime;
pub mod db;
pub mod download;
pub mod error;
pub mod file;
pub mod logging;
pub mod share;
pub mod transport;
pub mod upload;
pub mod web;

pub use config::Config;
pub use db::Database;
pub use download::{DownloadPlan, FetchPart, ReconstructionResolver, SessionStatus};
pub use error::{DriveError, Result};
pub use file::{FileRecord, Folder, LibraryService};
pub use share::{ShareState, SharingManager};
pub use transport::{BlobRef, BlobTransport, MemoryTransport, TelegramTransport};
pub use upload::{ChunkPlan, ChunkUpload, SessionResult, UploadLimits, UploadOrchestrator};
pub use web::{AppState, WebServer};
