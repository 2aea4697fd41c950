//! One bounded drain cycle over the job queue.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use collage_cache::ResultCache;
use collage_job_queue::{FailureKind, JobFailure, JobQueue, QueueItem};
use collage_jobs::{StrategyInput, StrategyRegistry};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Aggregate counts for one `drain` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items completed from the result cache without running a strategy.
    pub cache_hits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    CacheHit,
    Failed,
}

/// Pulls batches off the queue and runs them against registered strategies.
///
/// Clones share the queue, cache, registry, the process-wide permit pool and
/// the drain lock, so concurrent `drain` calls never overlap. Dispatched jobs
/// are never aborted: if a `drain` future is dropped they still finish and
/// mark their items.
#[derive(Clone)]
pub struct DrainProcessor {
    queue: JobQueue,
    cache: ResultCache,
    registry: Arc<StrategyRegistry>,
    permits: Arc<Semaphore>,
    process_cap: usize,
    job_timeout: Option<Duration>,
    drain_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for DrainProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainProcessor")
            .field("process_cap", &self.process_cap)
            .field("available_permits", &self.permits.available_permits())
            .field("job_timeout", &self.job_timeout)
            .finish()
    }
}

impl DrainProcessor {
    /// `process_cap` bounds how many jobs may execute at once across every
    /// clone of this processor. A cap of zero is treated as one.
    pub fn new(
        queue: JobQueue,
        cache: ResultCache,
        registry: Arc<StrategyRegistry>,
        process_cap: usize,
    ) -> Self {
        let process_cap = process_cap.max(1);
        Self {
            queue,
            cache,
            registry,
            permits: Arc::new(Semaphore::new(process_cap)),
            process_cap,
            job_timeout: None,
            drain_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Fail any job whose strategy runs longer than `timeout`. `None` disables the limit.
    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Take up to `max_concurrent` queued items and run them to a terminal state.
    ///
    /// Never fails: every per-item problem ends as `mark_failed` on that item.
    /// Returns once every dispatched item is done or failed.
    pub async fn drain(&self, max_concurrent: usize) -> DrainReport {
        let _serialized = self.drain_lock.lock().await;

        let mut report = DrainReport::default();
        if max_concurrent == 0 {
            return report;
        }
        let batch = self.queue.dequeue_batch(max_concurrent).await;
        if batch.is_empty() {
            return report;
        }
        report.dispatched = batch.len();
        debug!(dispatched = batch.len(), max_concurrent, "dispatching batch");

        // Jobs are detached tasks that record their own outcome, so dropping
        // this future leaves them running to completion.
        let handles: Vec<(Uuid, JoinHandle<Outcome>)> = batch
            .into_iter()
            .map(|item| {
                let worker = self.clone();
                (item.id, tokio::spawn(async move { worker.run_guarded(item).await }))
            })
            .collect();

        for (job_id, handle) in handles {
            match handle.await {
                Ok(Outcome::Succeeded) => report.succeeded += 1,
                Ok(Outcome::CacheHit) => {
                    report.succeeded += 1;
                    report.cache_hits += 1;
                }
                Ok(Outcome::Failed) => report.failed += 1,
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "job task terminated abnormally");
                    let kind = if e.is_panic() {
                        FailureKind::Panicked
                    } else {
                        FailureKind::Processing
                    };
                    self.queue
                        .mark_failed(job_id, JobFailure::new(kind, e.to_string()))
                        .await;
                    report.failed += 1;
                }
            }
        }

        info!(
            dispatched = report.dispatched,
            succeeded = report.succeeded,
            failed = report.failed,
            cache_hits = report.cache_hits,
            "drain cycle finished"
        );
        report
    }

    /// Run one item, turning any panic into a `panicked` failure, then drop its progress.
    async fn run_guarded(&self, item: QueueItem) -> Outcome {
        let outcome = match AssertUnwindSafe(self.run_item(&item)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(job_id = %item.id, strategy = %item.request.strategy, panic = %message, "job panicked");
                self.fail(&item, JobFailure::new(FailureKind::Panicked, message))
                    .await
            }
        };
        self.registry.collaborators().progress.clear(item.id).await;
        outcome
    }

    async fn run_item(&self, item: &QueueItem) -> Outcome {
        // The pool is never closed, so acquisition only fails if that changes.
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                return self
                    .fail(item, JobFailure::new(FailureKind::Processing, e.to_string()))
                    .await;
            }
        };

        if let Some(artifact) = self.cache.get(&item.fingerprint) {
            debug!(job_id = %item.id, fingerprint = item.fingerprint.short(), "serving cached artifact");
            self.queue.mark_done(item.id, artifact).await;
            return Outcome::CacheHit;
        }

        let strategy = match self.registry.resolve(&item.request.strategy) {
            Ok(strategy) => strategy,
            Err(e) => return self.fail(item, e.to_failure()).await,
        };

        let input = StrategyInput::from(item);
        let result = match self.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, strategy.execute(&input)).await {
                Ok(result) => result,
                Err(_) => {
                    let failure = JobFailure::new(
                        FailureKind::Timeout,
                        format!("strategy exceeded {}s", limit.as_secs_f64()),
                    );
                    return self.fail(item, failure).await;
                }
            },
            None => strategy.execute(&input).await,
        };

        match result {
            Ok(artifact) => {
                self.cache.put(item.fingerprint.clone(), artifact.clone());
                debug!(job_id = %item.id, location = %artifact.location, "job completed");
                self.queue.mark_done(item.id, artifact).await;
                Outcome::Succeeded
            }
            Err(e) => self.fail(item, e.to_failure()).await,
        }
    }

    async fn fail(&self, item: &QueueItem, failure: JobFailure) -> Outcome {
        warn!(
            job_id = %item.id,
            strategy = %item.request.strategy,
            kind = ?failure.kind,
            error = %failure.message,
            "job failed"
        );
        self.queue.mark_failed(item.id, failure).await;
        Outcome::Failed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "strategy panicked".to_string()
    }
}
