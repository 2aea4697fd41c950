//! Services strategies call out to while processing a job.
//!
//! All collaborators are shared between concurrently running jobs, so every
//! implementation must be `Send + Sync` and serialize its own state.

mod progress;
mod recognition;
mod storage;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub use progress::{InMemoryProgressTracker, ProgressSnapshot, ProgressTracker};
pub use recognition::{AnalysisReport, ImageAnalyzer, RecognitionService};
pub use storage::{LocalStorage, StorageService, StoredObject};

/// The three collaborator handles injected into every strategy.
#[derive(Clone)]
pub struct Collaborators {
    pub recognition: Arc<dyn RecognitionService>,
    pub storage: Arc<dyn StorageService>,
    pub progress: Arc<dyn ProgressTracker>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("recognition", &"<dyn RecognitionService>")
            .field("storage", &"<dyn StorageService>")
            .field("progress", &"<dyn ProgressTracker>")
            .finish()
    }
}

impl Collaborators {
    pub fn new(
        recognition: Arc<dyn RecognitionService>,
        storage: Arc<dyn StorageService>,
        progress: Arc<dyn ProgressTracker>,
    ) -> Self {
        Self {
            recognition,
            storage,
            progress,
        }
    }

    /// Local-filesystem collaborators: image analyzer and storage over the given
    /// directories, plus an in-memory progress tracker.
    pub fn local(assets_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        let assets_root = assets_root.into();
        Self::new(
            Arc::new(ImageAnalyzer::new(assets_root.clone())),
            Arc::new(LocalStorage::new(assets_root, output_root)),
            Arc::new(InMemoryProgressTracker::new()),
        )
    }
}
