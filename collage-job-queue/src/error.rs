//! Error types for the job queue system.

use thiserror::Error;
use uuid::Uuid;

use crate::types::JobStatus;

/// Errors that may occur while interacting with the job queue.
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("queue item not found: {0}")]
    NotFound(Uuid),

    #[error("queue item {id} is still {status}")]
    NotFinished { id: Uuid, status: JobStatus },
}
