#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use collage_cache::ResultCache;
use collage_job_queue::{ArtifactRef, JobQueue, ProcessingRequest};
use collage_jobs::{
    report_progress, Collaborators, ImageAnalyzer, InMemoryProgressTracker, LocalStorage,
    ProcessingStrategy, StrategyError, StrategyInput, StrategyRegistry,
};
use collage_scheduler::DrainProcessor;
use serde_json::json;

/// Sleeps for a while and records how many instances overlap.
pub struct Gauged {
    pub delay: Duration,
    pub active: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub runs: Arc<AtomicUsize>,
}

#[async_trait]
impl ProcessingStrategy for Gauged {
    fn name(&self) -> &str {
        "gauged"
    }

    async fn execute(&self, input: &StrategyInput) -> Result<ArtifactRef, StrategyError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(ArtifactRef::new(format!("out/{}.png", input.fingerprint.short()), 1))
    }
}

pub struct Failing;

#[async_trait]
impl ProcessingStrategy for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn execute(&self, _input: &StrategyInput) -> Result<ArtifactRef, StrategyError> {
        Err(StrategyError::NoUsableAssets("nothing to draw".into()))
    }
}

pub struct Panicking;

#[async_trait]
impl ProcessingStrategy for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn execute(&self, _input: &StrategyInput) -> Result<ArtifactRef, StrategyError> {
        panic!("tile buffer overflow")
    }
}

/// Reports half-way progress before finishing.
pub struct Reporting {
    pub collaborators: Collaborators,
}

#[async_trait]
impl ProcessingStrategy for Reporting {
    fn name(&self) -> &str {
        "reporting"
    }

    async fn execute(&self, input: &StrategyInput) -> Result<ArtifactRef, StrategyError> {
        report_progress(self.collaborators.progress.as_ref(), input.job_id, 50, "halfway").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(ArtifactRef::new(format!("out/{}.png", input.fingerprint.short()), 1))
    }
}

/// Counters shared between a test and its `gauged` strategy instances.
#[derive(Clone, Default)]
pub struct Gauges {
    pub active: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub runs: Arc<AtomicUsize>,
}

impl Gauges {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

pub struct Harness {
    pub queue: JobQueue,
    pub cache: ResultCache,
    pub registry: Arc<StrategyRegistry>,
    pub progress: Arc<InMemoryProgressTracker>,
    pub gauges: Gauges,
}

impl Harness {
    /// Registry with `gauged` (sleeping `delay`), `failing`, `panicking`,
    /// `reporting`, and `broken_factory` whose factory itself panics.
    pub fn new(delay: Duration) -> Self {
        let dir = std::env::temp_dir();
        let progress = Arc::new(InMemoryProgressTracker::new());
        let registry = Arc::new(StrategyRegistry::new(Collaborators::new(
            Arc::new(ImageAnalyzer::new(&dir)),
            Arc::new(LocalStorage::new(&dir, &dir)),
            progress.clone(),
        )));
        let gauges = Gauges::default();

        let g = gauges.clone();
        registry.register("gauged", move |_| {
            Arc::new(Gauged {
                delay,
                active: g.active.clone(),
                peak: g.peak.clone(),
                runs: g.runs.clone(),
            })
        });
        registry.register("failing", |_| Arc::new(Failing));
        registry.register("panicking", |_| Arc::new(Panicking));
        registry.register("reporting", |collaborators| Arc::new(Reporting { collaborators }));
        registry.register("broken_factory", |_| -> Arc<dyn ProcessingStrategy> {
            panic!("strategy wiring missing")
        });

        Self {
            queue: JobQueue::new(),
            cache: ResultCache::new(),
            registry,
            progress,
            gauges,
        }
    }

    pub fn processor(&self, process_cap: usize) -> DrainProcessor {
        DrainProcessor::new(
            self.queue.clone(),
            self.cache.clone(),
            self.registry.clone(),
            process_cap,
        )
    }

    /// Enqueue `count` distinct requests for `strategy`, returning their ids in order.
    pub async fn enqueue(&self, strategy: &str, count: usize) -> Vec<uuid::Uuid> {
        let mut ids = Vec::with_capacity(count);
        for n in 0..count {
            let request = ProcessingRequest::new(strategy, json!({ "n": n, "strategy": strategy }));
            ids.push(self.queue.enqueue(request).await.expect("valid request").item.id);
        }
        ids
    }
}
