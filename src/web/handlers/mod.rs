//! API handlers for the teledrive HTTP API.

pub mod file;
pub mod folder;
pub mod share;

pub use file::*;
pub use folder::*;
pub use share::*;

use std::sync::Arc;

use crate::download::ReconstructionResolver;
use crate::file::LibraryService;
use crate::share::SharingManager;
use crate::transport::BlobTransport;
use crate::upload::{UploadLimits, UploadOrchestrator};
use crate::{Database, Result};

/// Shared state of all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Folder and listing operations.
    pub library: LibraryService,
    /// Upload orchestration.
    pub uploads: UploadOrchestrator,
    /// Download planning.
    pub resolver: ReconstructionResolver,
    /// Share tokens.
    pub sharing: SharingManager,
}

impl AppState {
    /// Wire every component to one pool and one transport.
    pub fn new(db: &Database, transport: Arc<dyn BlobTransport>, limits: UploadLimits) -> Result<Self> {
        let pool = db.pool().clone();
        Ok(Self {
            library: LibraryService::new(pool.clone()),
            uploads: UploadOrchestrator::new(pool.clone(), transport.clone(), limits)?,
            resolver: ReconstructionResolver::new(pool.clone(), transport),
            sharing: SharingManager::new(pool),
        })
    }

    /// Largest request body the API accepts: one blob plus form overhead.
    pub fn body_limit(&self) -> usize {
        const FORM_OVERHEAD: u64 = 1024 * 1024;
        let limit = self.uploads.limits().max_blob_size.saturating_add(FORM_OVERHEAD);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}
