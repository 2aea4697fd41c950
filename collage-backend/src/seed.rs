//! Seeding the queue from a JSON file of processing requests.

use std::path::{Path, PathBuf};

use collage_job_queue::{JobQueue, ProcessingRequest};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("seed file {path} is not a JSON array of requests: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of enqueueing a batch of seed requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Read a JSON array of `{ "strategy": ..., "payload": {...} }` objects.
pub fn read_seed_file(path: &Path) -> Result<Vec<ProcessingRequest>, SeedError> {
    let content = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SeedError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Enqueue every request, logging and counting the ones the queue rejects.
pub async fn seed_queue(queue: &JobQueue, requests: Vec<ProcessingRequest>) -> SeedSummary {
    let mut summary = SeedSummary::default();
    for (index, request) in requests.into_iter().enumerate() {
        match queue.enqueue(request).await {
            Ok(result) if result.duplicate => summary.duplicates += 1,
            Ok(_) => summary.accepted += 1,
            Err(e) => {
                tracing::warn!(index, error = %e, "rejected seed request");
                summary.rejected += 1;
            }
        }
    }
    summary
}
