//! Download module for teledrive.

mod resolver;

pub use resolver::{DownloadPlan, FetchPart, ReconstructionResolver, SessionStatus};
