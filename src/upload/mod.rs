//! Upload module for teledrive.
//!
//! Large files are split into fixed-size chunks by [`ChunkPlan`]; each chunk
//! becomes one blob and one chunk record sharing an upload session id.

mod orchestrator;
mod plan;

pub use orchestrator::{
    chunk_label, ChunkUpload, SessionResult, UploadLimits, UploadOrchestrator, UploadProgress,
};
pub use plan::{new_session_id, ChunkPlan, ChunkRange, MAX_CHUNKS};
