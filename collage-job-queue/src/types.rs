//! Core types for the job queue system.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::JobQueueError;

/// A request for one unit of processing work.
///
/// `strategy` names the processing strategy that should handle the request;
/// `payload` is opaque to the queue and interpreted only by that strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRequest {
    pub strategy: String,
    pub payload: Value,
}

impl ProcessingRequest {
    #[inline]
    pub fn new(strategy: impl Into<String>, payload: Value) -> Self {
        Self {
            strategy: strategy.into(),
            payload,
        }
    }

    /// Reject requests that can never be processed.
    pub fn validate(&self) -> Result<(), JobQueueError> {
        let name = self.strategy.trim();
        if name.is_empty() {
            return Err(JobQueueError::Validation(
                "strategy name must not be empty".into(),
            ));
        }
        if name != self.strategy {
            return Err(JobQueueError::Validation(format!(
                "strategy name has surrounding whitespace: {:?}",
                self.strategy
            )));
        }
        if !self.payload.is_object() {
            return Err(JobQueueError::Validation(
                "payload must be a JSON object".into(),
            ));
        }
        Ok(())
    }

    /// Derive the deterministic fingerprint of this request.
    ///
    /// Object keys in `serde_json::Value` are kept sorted, so two payloads with
    /// the same content serialize identically regardless of insertion order.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.strategy.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.payload.to_string().as_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }
}

/// Hex-encoded SHA-256 of a request's significant inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters of the digest, handy for file names and log lines.
    #[inline]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(16)]
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a produced artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub location: String,
    pub size: u64,
}

impl ArtifactRef {
    #[inline]
    pub fn new(location: impl Into<String>, size: u64) -> Self {
        Self {
            location: location.into(),
            size,
        }
    }
}

/// Status of a queue item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// Returns true if this status represents a terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true while the item still blocks its fingerprint.
    #[inline]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Classification of a job failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request named a strategy that was never registered.
    UnknownStrategy,
    /// The payload could not be interpreted by the strategy.
    InvalidRequest,
    /// A recognition or storage collaborator failed.
    Collaborator,
    /// The strategy itself gave up (nothing usable to produce, encoding failure, ...).
    Processing,
    Timeout,
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnknownStrategy => "unknown_strategy",
            Self::InvalidRequest => "invalid_request",
            Self::Collaborator => "collaborator",
            Self::Processing => "processing",
            Self::Timeout => "timeout",
            Self::Panicked => "panicked",
        })
    }
}

/// Structured error detail recorded on a failed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    #[inline]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// One unit of queued work and its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub request: ProcessingRequest,
    pub fingerprint: Fingerprint,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<JobFailure>,
    pub result: Option<ArtifactRef>,
}

impl QueueItem {
    /// Create a new queued item.
    pub fn new(request: ProcessingRequest) -> Self {
        let fingerprint = request.fingerprint();
        Self {
            id: Uuid::new_v4(),
            request,
            fingerprint,
            status: JobStatus::Queued,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
            result: None,
        }
    }

    /// `queued -> processing`. Returns false if the item was not queued.
    pub fn start(&mut self) -> bool {
        if self.status != JobStatus::Queued {
            return false;
        }
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
        true
    }

    /// `processing -> done`. Returns false if the item was not processing.
    pub fn complete(&mut self, result: ArtifactRef) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        self.status = JobStatus::Done;
        self.finished_at = Some(Utc::now());
        self.result = Some(result);
        true
    }

    /// `processing -> failed`. Returns false if the item was not processing.
    pub fn fail(&mut self, failure: JobFailure) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        self.status = JobStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(failure);
        true
    }
}

/// Result returned by `enqueue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResult {
    pub item: QueueItem,
    /// True when an in-flight item with the same fingerprint was returned
    /// instead of a new one.
    pub duplicate: bool,
}

/// Point-in-time counts for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queue_size: usize,
    pub processing_count: usize,
}
