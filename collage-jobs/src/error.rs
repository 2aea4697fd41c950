//! Job execution errors.

use collage_job_queue::{FailureKind, JobFailure};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Failures raised by recognition, storage or progress collaborators.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("recognition failed for {asset}: {reason}")]
    Recognition { asset: String, reason: String },

    #[error("storage i/o error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("progress update failed: {0}")]
    Progress(String),
}

/// Errors a processing strategy can end a job with.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("asset {asset} could not be decoded: {reason}")]
    Decode { asset: String, reason: String },

    #[error("no usable assets: {0}")]
    NoUsableAssets(String),

    #[error("failed to encode composite: {0}")]
    Encode(String),

    #[error("image worker failed: {0}")]
    Worker(String),
}

impl StrategyError {
    /// Convert into the structured detail recorded on the queue item.
    pub fn to_failure(&self) -> JobFailure {
        let kind = match self {
            Self::InvalidPayload(_) => FailureKind::InvalidRequest,
            Self::Collaborator(_) => FailureKind::Collaborator,
            Self::Decode { .. } | Self::NoUsableAssets(_) | Self::Encode(_) | Self::Worker(_) => {
                FailureKind::Processing
            }
        };
        JobFailure::new(kind, self.to_string())
    }
}

/// Errors returned by the strategy registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
}

impl RegistryError {
    pub fn to_failure(&self) -> JobFailure {
        match self {
            Self::UnknownStrategy(_) => JobFailure::new(FailureKind::UnknownStrategy, self.to_string()),
        }
    }
}

/// Consume the result of a collaborator call that must never fail the
/// surrounding job. Failures are logged and turned into `None`.
pub fn non_fatal<T>(operation: &str, job_id: Uuid, result: Result<T, CollaboratorError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(job_id = %job_id, operation, error = %e, "non-fatal collaborator failure ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_errors_map_to_failure_kinds() {
        let invalid = StrategyError::InvalidPayload("missing assets".into());
        assert_eq!(invalid.to_failure().kind, FailureKind::InvalidRequest);

        let storage = StrategyError::from(CollaboratorError::InvalidPath("../etc".into()));
        let failure = storage.to_failure();
        assert_eq!(failure.kind, FailureKind::Collaborator);
        assert!(failure.message.contains("../etc"));

        let empty = StrategyError::NoUsableAssets("all skipped".into());
        assert_eq!(empty.to_failure().kind, FailureKind::Processing);
    }

    #[test]
    fn unknown_strategy_failure() {
        let failure = RegistryError::UnknownStrategy("sepia".into()).to_failure();
        assert_eq!(failure.kind, FailureKind::UnknownStrategy);
        assert_eq!(failure.message, "unknown strategy: sepia");
    }

    #[test]
    fn non_fatal_swallows_errors() {
        let id = Uuid::new_v4();
        assert_eq!(non_fatal("progress", id, Ok::<_, CollaboratorError>(3)), Some(3));
        let failed: Result<(), _> = Err(CollaboratorError::Progress("tracker offline".into()));
        assert_eq!(non_fatal("progress", id, failed), None);
    }
}
