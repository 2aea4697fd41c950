//! The capability every processing strategy implements.

use async_trait::async_trait;
use collage_job_queue::{ArtifactRef, Fingerprint, ProcessingRequest, QueueItem};
use uuid::Uuid;

use crate::collaborators::ProgressTracker;
use crate::error::{non_fatal, StrategyError};

/// Everything a strategy gets to know about the job it runs.
#[derive(Debug, Clone)]
pub struct StrategyInput {
    pub job_id: Uuid,
    pub fingerprint: Fingerprint,
    pub request: ProcessingRequest,
}

impl From<&QueueItem> for StrategyInput {
    fn from(item: &QueueItem) -> Self {
        Self {
            job_id: item.id,
            fingerprint: item.fingerprint.clone(),
            request: item.request.clone(),
        }
    }
}

/// A named, swappable unit of work.
///
/// Instances may run concurrently with other instances; any state shared
/// between invocations must live in the injected collaborators.
#[async_trait]
pub trait ProcessingStrategy: Send + Sync {
    /// Name the strategy is registered under.
    fn name(&self) -> &str;

    /// Produce an artifact for the request, or say why not.
    async fn execute(&self, input: &StrategyInput) -> Result<ArtifactRef, StrategyError>;
}

/// Push a progress update; failures are logged and never reach the caller.
pub async fn report_progress(tracker: &dyn ProgressTracker, job_id: Uuid, percent: u8, label: &str) {
    non_fatal("progress.update", job_id, tracker.update(job_id, percent, label).await);
}
