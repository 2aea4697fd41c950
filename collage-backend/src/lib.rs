//! Collage backend wiring.
//!
//! Builds the queue, cache, strategy registry and scheduler from a loaded
//! [`Config`] as explicit values; nothing here is a process-wide singleton.

pub mod seed;

use std::sync::Arc;

use collage_cache::ResultCache;
use collage_config::Config;
use collage_job_queue::JobQueue;
use collage_jobs::{register_builtin_strategies, Collaborators, StrategyRegistry};
use collage_scheduler::{scheduler_from_config, Scheduler};

/// The live components of one backend process.
#[derive(Debug)]
pub struct Backend {
    pub queue: JobQueue,
    pub cache: ResultCache,
    pub registry: Arc<StrategyRegistry>,
    pub scheduler: Scheduler,
}

impl Backend {
    /// Wire local-filesystem collaborators and the built-in strategies.
    pub fn from_config(config: &Config) -> Self {
        let collaborators = Collaborators::local(
            &config.storage.assets_directory,
            &config.storage.output_directory,
        );
        Self::with_collaborators(config, collaborators)
    }

    pub fn with_collaborators(config: &Config, collaborators: Collaborators) -> Self {
        let registry = Arc::new(StrategyRegistry::new(collaborators));
        register_builtin_strategies(&registry, config.recognition.min_confidence);

        let queue = JobQueue::new();
        let cache = ResultCache::new();
        let scheduler = scheduler_from_config(config, queue.clone(), cache.clone(), registry.clone());

        tracing::info!(
            strategies = ?registry.list_names(),
            max_concurrent = config.scheduler.max_concurrent,
            assets_dir = %config.storage.assets_directory,
            output_dir = %config.storage.output_directory,
            "backend components wired"
        );

        Self {
            queue,
            cache,
            registry,
            scheduler,
        }
    }
}
