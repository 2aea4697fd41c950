mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use collage_job_queue::{ArtifactRef, Fingerprint, JobStatus};
use collage_scheduler::{Scheduler, SchedulerSettings};
use common::Harness;

const INTERVAL: Duration = Duration::from_secs(5);

fn settings() -> SchedulerSettings {
    SchedulerSettings {
        max_concurrent: 3,
        ..SchedulerSettings::default()
    }
}

#[tokio::test(start_paused = true)]
async fn loop_drains_one_batch_per_interval() {
    let harness = Harness::new(Duration::ZERO);
    harness.enqueue("gauged", 5).await;
    let scheduler = Scheduler::new(harness.processor(3), settings());

    assert!(scheduler.start(INTERVAL));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.queue.status().await.queue_size, 2);
    assert_eq!(harness.gauges.runs(), 3);

    tokio::time::sleep(INTERVAL).await;
    assert_eq!(harness.queue.status().await.queue_size, 0);
    assert_eq!(harness.gauges.runs(), 5);
    assert!(scheduler.health().iterations >= 2);

    scheduler.stop().await;
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn start_while_running_is_ignored() {
    let harness = Harness::new(Duration::ZERO);
    let scheduler = Scheduler::new(harness.processor(3), settings());

    assert!(scheduler.start(INTERVAL));
    assert!(!scheduler.start(INTERVAL));
    assert!(scheduler.is_running());
    scheduler.stop().await;
}

#[tokio::test]
async fn stop_when_stopped_is_a_no_op() {
    let harness = Harness::new(Duration::ZERO);
    let scheduler = Scheduler::new(harness.processor(3), settings());

    scheduler.stop().await;
    scheduler.stop().await;
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.health().iterations, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_then_start_resumes_processing() {
    let harness = Harness::new(Duration::ZERO);
    let scheduler = Scheduler::new(harness.processor(3), settings());

    assert!(scheduler.start(INTERVAL));
    tokio::time::sleep(Duration::from_secs(1)).await;
    scheduler.stop().await;
    assert!(!scheduler.is_running());

    harness.enqueue("gauged", 2).await;
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(harness.queue.status().await.queue_size, 2, "stopped loop must not drain");

    assert!(scheduler.start(INTERVAL));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.queue.status().await.queue_size, 0);
    assert_eq!(harness.gauges.runs(), 2);
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_the_running_iteration() {
    let harness = Harness::new(Duration::from_secs(20));
    let id = harness.enqueue("gauged", 1).await[0];
    let scheduler = Scheduler::new(harness.processor(3), settings());

    scheduler.start(INTERVAL);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.queue.status().await.processing_count, 1);

    scheduler.stop().await;
    assert_eq!(harness.gauges.runs(), 1);
    assert_eq!(harness.queue.get(id).await.unwrap().status, JobStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn cache_eviction_follows_its_own_cadence() {
    let harness = Harness::new(Duration::ZERO);
    let stale = Fingerprint::from("stale");
    harness.cache.put_at(
        stale.clone(),
        ArtifactRef::new("out/stale.png", 1),
        Utc::now() - chrono::Duration::hours(2),
    );
    let scheduler = Scheduler::new(
        harness.processor(3),
        SchedulerSettings {
            eviction_interval: Duration::from_secs(60),
            cache_max_age: Duration::from_secs(3600),
            ..settings()
        },
    );

    scheduler.start(INTERVAL);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(harness.cache.get(&stale).is_some(), "eviction is not due yet");

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(harness.cache.get(&stale).is_none());
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn report_combines_queue_cache_and_health() {
    let harness = Harness::new(Duration::ZERO);
    harness.enqueue("gauged", 4).await;
    let scheduler = Scheduler::new(harness.processor(3), settings());

    let before = scheduler.report().await;
    assert!(!before.scheduler.running);
    assert!(before.scheduler.last_iteration_at.is_none());
    assert_eq!(before.queue.queue_size, 4);

    scheduler.start(INTERVAL);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let during = scheduler.report().await;
    assert!(during.scheduler.running);
    assert!(during.scheduler.last_iteration_at.is_some());
    assert_eq!(during.queue.queue_size, 1);
    assert_eq!(during.cache.entry_count, 3);

    scheduler.stop().await;
    assert!(!scheduler.report().await.scheduler.running);
}

#[tokio::test(start_paused = true)]
async fn panicking_iteration_keeps_the_loop_alive() {
    let harness = Harness::new(Duration::ZERO);
    harness.enqueue("gauged", 5).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let scheduler = Scheduler::new(harness.processor(3), settings()).with_observer(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("status sink unavailable");
        }
    });

    assert!(scheduler.start(INTERVAL));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.queue.status().await.queue_size, 2);
    assert!(scheduler.is_running());

    tokio::time::sleep(INTERVAL).await;
    assert_eq!(harness.queue.status().await.queue_size, 0);
    assert_eq!(harness.gauges.runs(), 5);
    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert!(scheduler.is_running());
    assert!(scheduler.health().iterations >= 2);

    scheduler.stop().await;
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("runtime")
}

#[test]
fn start_recovers_after_the_loop_task_is_lost() {
    let harness = Harness::new(Duration::ZERO);
    let scheduler = Scheduler::new(harness.processor(3), settings());

    let first = paused_runtime();
    first.block_on(async {
        assert!(scheduler.start(INTERVAL));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(scheduler.is_running());
    });
    // shutting the runtime down drops the loop task without a stop()
    drop(first);
    assert!(!scheduler.is_running());

    let second = paused_runtime();
    second.block_on(async {
        harness.enqueue("gauged", 2).await;
        assert!(scheduler.start(INTERVAL));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(harness.queue.status().await.queue_size, 0);
        assert_eq!(harness.gauges.runs(), 2);
        scheduler.stop().await;
    });
    assert!(!scheduler.is_running());
}
