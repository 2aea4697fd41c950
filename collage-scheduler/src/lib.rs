//! Background scheduling for collage jobs.
//!
//! [`DrainProcessor`] runs one bounded batch of queued items against the
//! strategy registry. [`Scheduler`] owns the control loop that calls it on a
//! fixed interval and evicts stale cache entries on its own cadence.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use collage_cache::ResultCache;
//! use collage_job_queue::JobQueue;
//! use collage_jobs::{register_builtin_strategies, Collaborators, StrategyRegistry};
//! use collage_scheduler::{DrainProcessor, Scheduler, SchedulerSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(StrategyRegistry::new(Collaborators::local("./assets", "./out")));
//!     register_builtin_strategies(&registry, 0.5);
//!
//!     let processor = DrainProcessor::new(JobQueue::new(), ResultCache::new(), registry, 3);
//!     let scheduler = Scheduler::new(processor, SchedulerSettings::default());
//!     scheduler.start(Duration::from_secs(5));
//!     // ...
//!     scheduler.stop().await;
//! }
//! ```

mod cadence;
mod processor;
mod scheduler;

pub use processor::{DrainProcessor, DrainReport};
pub use scheduler::{
    scheduler_from_config, IterationObserver, OperationalSnapshot, Scheduler, SchedulerHealth,
    SchedulerSettings,
};
