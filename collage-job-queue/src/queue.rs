//! Job queue implementation.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::JobQueueError;
use crate::types::{
    ArtifactRef, EnqueueResult, Fingerprint, JobFailure, ProcessingRequest, QueueItem,
    QueueSnapshot,
};

/// Maximum number of finished items kept around until a consumer observes them.
const MAX_FINISHED_ITEMS: usize = 1000;

/// Internal storage optimized for FIFO dequeue, lookup by ID and lookup by fingerprint.
#[derive(Debug, Default)]
struct JobQueueState {
    /// Queued item IDs, oldest first.
    pending: VecDeque<Uuid>,
    /// Finished item IDs, oldest first.
    finished: VecDeque<Uuid>,
    /// Map from ID to item for O(1) lookup.
    items: HashMap<Uuid, QueueItem>,
    /// Fingerprints of every queued or processing item.
    in_flight: HashMap<Fingerprint, Uuid>,
    processing: usize,
}

impl JobQueueState {
    fn insert(&mut self, item: QueueItem) {
        let id = item.id;
        self.in_flight.insert(item.fingerprint.clone(), id);
        self.pending.push_back(id);
        self.items.insert(id, item);
    }

    /// Move a terminal item out of the in-flight index and into the finished ring.
    fn retire(&mut self, id: Uuid, fingerprint: &Fingerprint) {
        if self.in_flight.get(fingerprint) == Some(&id) {
            self.in_flight.remove(fingerprint);
        }
        self.processing = self.processing.saturating_sub(1);
        self.finished.push_back(id);

        while self.finished.len() > MAX_FINISHED_ITEMS {
            if let Some(old_id) = self.finished.pop_front() {
                self.items.remove(&old_id);
            }
        }
    }

    fn get_mut(&mut self, id: &Uuid) -> Option<&mut QueueItem> {
        self.items.get_mut(id)
    }
}

/// Ordered, fingerprint-deduplicated backlog of processing requests.
///
/// Cloning is cheap; clones share the same backlog.
#[derive(Clone, Default)]
pub struct JobQueue {
    state: Arc<RwLock<JobQueueState>>,
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("state", &"<RwLock<JobQueueState>>")
            .finish()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a request.
    ///
    /// If an item with the same fingerprint is still queued or processing, that
    /// item is returned with `duplicate = true` and nothing new is enqueued.
    pub async fn enqueue(&self, request: ProcessingRequest) -> Result<EnqueueResult, JobQueueError> {
        request.validate()?;
        let item = QueueItem::new(request);

        let mut state = self.state.write().await;
        if let Some(existing) = state
            .in_flight
            .get(&item.fingerprint)
            .and_then(|id| state.items.get(id))
        {
            debug!(
                job_id = %existing.id,
                fingerprint = existing.fingerprint.short(),
                status = %existing.status,
                "request already in flight, returning existing item"
            );
            return Ok(EnqueueResult {
                item: existing.clone(),
                duplicate: true,
            });
        }

        debug!(
            job_id = %item.id,
            strategy = %item.request.strategy,
            fingerprint = item.fingerprint.short(),
            "enqueued request"
        );
        state.insert(item.clone());
        Ok(EnqueueResult {
            item,
            duplicate: false,
        })
    }

    /// Atomically take up to `max_count` queued items in FIFO order and mark them processing.
    pub async fn dequeue_batch(&self, max_count: usize) -> Vec<QueueItem> {
        let mut state = self.state.write().await;
        let mut batch = Vec::with_capacity(max_count.min(state.pending.len()));

        while batch.len() < max_count {
            let Some(id) = state.pending.pop_front() else {
                break;
            };
            if let Some(item) = state.get_mut(&id) {
                if item.start() {
                    batch.push(item.clone());
                }
            }
        }
        state.processing += batch.len();
        batch
    }

    /// Record a successful outcome. Returns false (and logs) if the item is
    /// unknown or not processing.
    pub async fn mark_done(&self, id: Uuid, result: ArtifactRef) -> bool {
        let mut state = self.state.write().await;
        let Some(item) = state.get_mut(&id) else {
            warn!(job_id = %id, "mark_done on unknown queue item");
            return false;
        };
        if !item.complete(result) {
            warn!(job_id = %id, status = %item.status, "mark_done ignored, item is not processing");
            return false;
        }
        let fingerprint = item.fingerprint.clone();
        state.retire(id, &fingerprint);
        true
    }

    /// Record a failed outcome. Returns false (and logs) if the item is
    /// unknown or not processing.
    pub async fn mark_failed(&self, id: Uuid, failure: JobFailure) -> bool {
        let mut state = self.state.write().await;
        let Some(item) = state.get_mut(&id) else {
            warn!(job_id = %id, "mark_failed on unknown queue item");
            return false;
        };
        if !item.fail(failure) {
            warn!(job_id = %id, status = %item.status, "mark_failed ignored, item is not processing");
            return false;
        }
        let fingerprint = item.fingerprint.clone();
        state.retire(id, &fingerprint);
        true
    }

    /// Snapshot counts for observability.
    pub async fn status(&self) -> QueueSnapshot {
        let state = self.state.read().await;
        QueueSnapshot {
            queue_size: state.pending.len(),
            processing_count: state.processing,
        }
    }

    /// Get a specific item by ID.
    pub async fn get(&self, id: Uuid) -> Option<QueueItem> {
        let state = self.state.read().await;
        state.items.get(&id).cloned()
    }

    /// Remove a terminal item once the consumer has observed it.
    pub async fn take_finished(&self, id: Uuid) -> Result<QueueItem, JobQueueError> {
        let mut state = self.state.write().await;
        let status = state
            .items
            .get(&id)
            .map(|item| item.status)
            .ok_or(JobQueueError::NotFound(id))?;
        if !status.is_terminal() {
            return Err(JobQueueError::NotFinished { id, status });
        }
        state.finished.retain(|finished| *finished != id);
        state.items.remove(&id).ok_or(JobQueueError::NotFound(id))
    }

    /// Number of finished items not yet taken by a consumer.
    pub async fn finished_count(&self) -> usize {
        self.state.read().await.finished.len()
    }
}
