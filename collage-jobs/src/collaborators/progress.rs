//! Progress reporting collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CollaboratorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: Uuid,
    pub percent: u8,
    pub label: String,
    pub updated_at: DateTime<Utc>,
}

/// Best-effort progress sink. Callers must treat update failures as non-fatal.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    async fn update(&self, job_id: Uuid, percent: u8, label: &str) -> Result<(), CollaboratorError>;

    async fn read(&self, job_id: Uuid) -> Option<ProgressSnapshot>;

    /// Drop whatever is kept for a job that reached a terminal state.
    async fn clear(&self, job_id: Uuid);
}

/// Keeps the latest snapshot per job in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProgressTracker {
    entries: Arc<DashMap<Uuid, ProgressSnapshot>>,
}

impl InMemoryProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ProgressTracker for InMemoryProgressTracker {
    async fn update(&self, job_id: Uuid, percent: u8, label: &str) -> Result<(), CollaboratorError> {
        if percent > 100 {
            return Err(CollaboratorError::Progress(format!(
                "percent out of range: {percent}"
            )));
        }
        self.entries.insert(
            job_id,
            ProgressSnapshot {
                job_id,
                percent,
                label: label.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn read(&self, job_id: Uuid) -> Option<ProgressSnapshot> {
        self.entries.get(&job_id).map(|entry| entry.clone())
    }

    async fn clear(&self, job_id: Uuid) {
        self.entries.remove(&job_id);
    }
}
