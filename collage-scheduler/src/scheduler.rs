//! The background control loop.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use collage_cache::{CacheSnapshot, ResultCache};
use collage_config::Config;
use collage_job_queue::{JobQueue, QueueSnapshot};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cadence::Cadence;
use crate::processor::{DrainProcessor, DrainReport};

/// Loop tuning that stays fixed for the lifetime of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Passed to every `drain` call.
    pub max_concurrent: usize,
    pub eviction_interval: Duration,
    pub status_interval: Duration,
    pub cache_max_age: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            eviction_interval: Duration::from_secs(600),
            status_interval: Duration::from_secs(60),
            cache_max_age: Duration::from_secs(3600),
        }
    }
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent: config.scheduler.max_concurrent,
            eviction_interval: config.scheduler.eviction_interval(),
            status_interval: config.scheduler.status_interval(),
            cache_max_age: config.cache.max_age(),
        }
    }
}

/// Liveness view of the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerHealth {
    pub running: bool,
    pub last_iteration_at: Option<DateTime<Utc>>,
    pub iterations: u64,
}

/// Everything the reporting layer needs in one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalSnapshot {
    pub queue: QueueSnapshot,
    pub cache: CacheSnapshot,
    pub scheduler: SchedulerHealth,
}

#[derive(Debug, Default)]
struct HealthState {
    iterations: AtomicU64,
    last_iteration_at: Mutex<Option<DateTime<Utc>>>,
}

impl HealthState {
    fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        *self
            .last_iteration_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }
}

#[derive(Debug)]
struct LoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Called with the report of every drain the loop performs.
pub type IterationObserver = Arc<dyn Fn(&DrainReport) + Send + Sync>;

/// Clears the running flag however the loop task ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the single background loop: `stopped -> start() -> running -> stop() -> stopped`.
pub struct Scheduler {
    processor: DrainProcessor,
    settings: SchedulerSettings,
    running: Arc<AtomicBool>,
    health: Arc<HealthState>,
    observer: Option<IterationObserver>,
    handle: Mutex<Option<LoopHandle>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("processor", &self.processor)
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Scheduler {
    pub fn new(processor: DrainProcessor, settings: SchedulerSettings) -> Self {
        Self {
            processor,
            settings,
            running: Arc::new(AtomicBool::new(false)),
            health: Arc::new(HealthState::default()),
            observer: None,
            handle: Mutex::new(None),
        }
    }

    /// Invoke `observer` after every drain. A panicking observer only ends
    /// the iteration it ran in.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&DrainReport) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Spawn the loop on the current tokio runtime, waking every `interval`.
    ///
    /// Returns `false` without doing anything if the loop is already running.
    pub fn start(&self, interval: Duration) -> bool {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("scheduler already running, ignoring start");
            return false;
        }
        if let Some(stale) = handle.take() {
            stale.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let control = ControlLoop {
            processor: self.processor.clone(),
            settings: self.settings,
            health: self.health.clone(),
            observer: self.observer.clone(),
            _running: RunningGuard(self.running.clone()),
        };
        let task = tokio::spawn(control.run(interval, cancel.clone()));
        *handle = Some(LoopHandle { cancel, task });

        info!(
            interval_secs = interval.as_secs_f64(),
            max_concurrent = self.settings.max_concurrent,
            "scheduler started"
        );
        true
    }

    /// Cancel the loop and wait for its current iteration to finish.
    ///
    /// A no-op when the loop is not running. Jobs dispatched by the iteration
    /// in progress are awaited, not aborted.
    pub async fn stop(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(LoopHandle { cancel, task }) = handle else {
            debug!("scheduler not running, nothing to stop");
            return;
        };

        cancel.cancel();
        if let Err(e) = task.await {
            error!(error = %e, "scheduler loop ended abnormally");
        }
        self.running.store(false, Ordering::SeqCst);
        info!("scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> SchedulerHealth {
        SchedulerHealth {
            running: self.is_running(),
            last_iteration_at: *self
                .health
                .last_iteration_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            iterations: self.health.iterations.load(Ordering::Relaxed),
        }
    }

    /// Queue, cache and loop health in a single snapshot.
    pub async fn report(&self) -> OperationalSnapshot {
        OperationalSnapshot {
            queue: self.processor.queue().status().await,
            cache: self.processor.cache().snapshot(),
            scheduler: self.health(),
        }
    }

    pub fn processor(&self) -> &DrainProcessor {
        &self.processor
    }
}

/// State moved into the spawned loop task.
struct ControlLoop {
    processor: DrainProcessor,
    settings: SchedulerSettings,
    health: Arc<HealthState>,
    observer: Option<IterationObserver>,
    _running: RunningGuard,
}

impl ControlLoop {
    async fn run(self, interval: Duration, cancel: CancellationToken) {
        let started = Instant::now();
        let mut eviction = Cadence::new(self.settings.eviction_interval, started);
        let mut status = Cadence::new(self.settings.status_interval, started);

        loop {
            let iteration = AssertUnwindSafe(self.iterate(&mut eviction, &mut status)).catch_unwind();
            if iteration.await.is_err() {
                error!("scheduler iteration panicked, continuing");
            }
            self.health.record_iteration();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("scheduler loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    async fn iterate(&self, eviction: &mut Cadence, status: &mut Cadence) {
        let report = self.processor.drain(self.settings.max_concurrent).await;
        if let Some(observer) = &self.observer {
            observer(&report);
        }

        let now = Instant::now();
        if eviction.due(now) {
            let evicted = self
                .processor
                .cache()
                .evict_older_than(self.settings.cache_max_age);
            if evicted > 0 {
                info!(evicted, "evicted stale cache entries");
            }
        }

        if status.due(now) {
            let queue = self.processor.queue().status().await;
            if queue.queue_size > 0 {
                info!(
                    queue_size = queue.queue_size,
                    processing_count = queue.processing_count,
                    cache_entries = self.processor.cache().len(),
                    "scheduler status"
                );
            }
        }
    }
}

/// Wire a scheduler from loaded configuration.
pub fn scheduler_from_config(
    config: &Config,
    queue: JobQueue,
    cache: ResultCache,
    registry: Arc<collage_jobs::StrategyRegistry>,
) -> Scheduler {
    let processor = DrainProcessor::new(queue, cache, registry, config.scheduler.max_concurrent)
        .with_job_timeout(config.scheduler.job_timeout());
    Scheduler::new(processor, SchedulerSettings::from(config))
}
