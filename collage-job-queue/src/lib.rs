//! Fingerprint-deduplicated job queue used by the collage processing core.
//!
//! Callers enqueue [`ProcessingRequest`]s; the processor drains them in FIFO
//! batches and reports each outcome back with [`JobQueue::mark_done`] or
//! [`JobQueue::mark_failed`]. At most one item per [`Fingerprint`] is ever
//! queued or processing at a time.
//!
//! # Architecture
//!
//! - [`JobQueue`] - The shared backlog and its status tracking
//! - [`QueueItem`] - One unit of work and its lifecycle
//! - [`ProcessingRequest`] - What a caller asks for
//! - [`JobFailure`] - Structured error detail recorded on failed items
//!
//! # Example
//!
//! ```rust,no_run
//! use collage_job_queue::{ArtifactRef, JobQueue, ProcessingRequest};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let queue = JobQueue::new();
//!
//!     let request = ProcessingRequest::new("fast", json!({"assets": ["a.png"]}));
//!     let enqueued = queue.enqueue(request).await.unwrap();
//!
//!     for item in queue.dequeue_batch(4).await {
//!         queue.mark_done(item.id, ArtifactRef::new("out.png", 1024)).await;
//!     }
//!     println!("done: {}", enqueued.item.id);
//! }
//! ```

mod error;
mod queue;
mod types;

pub use error::JobQueueError;
pub use queue::JobQueue;
pub use types::{
    ArtifactRef, EnqueueResult, FailureKind, Fingerprint, JobFailure, JobStatus,
    ProcessingRequest, QueueItem, QueueSnapshot,
};
