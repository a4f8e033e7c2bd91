//! Integration tests for job execution through the worker pool.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::Instant;

use mediaq_broker::BrokerStats;
use mediaq_broker::memory::MemoryBroker;
use mediaq_core::traits::WorkError;
use mediaq_core::types::{MediaKind, ProcessingStatus};

use helpers::{
    FailingWork, FlakyBroker, SlowEnqueueBroker, TestHarness, TimedWork, test_config,
};

#[tokio::test(start_paused = true)]
async fn test_batch_of_500_photos_with_two_workers() {
    let mut config = test_config();
    config.worker.concurrency = 2;
    config.worker.soft_time_limit_seconds = 240;
    config.worker.hard_time_limit_seconds = 300;
    config.broker.visibility_timeout_seconds = 360;

    let work = TimedWork::new(Duration::from_secs(1));
    let app = TestHarness::start(config, work.clone());
    app.seed(MediaKind::Photo, 500);

    let started = Instant::now();
    app.discover(MediaKind::Photo, 500).await;

    let done = app
        .wait_for_counts(MediaKind::Photo, Duration::from_secs(400), |c| c.processed == 500)
        .await;
    let elapsed = started.elapsed();

    assert!(done, "all items should be processed");
    assert!(
        elapsed >= Duration::from_secs(250) && elapsed < Duration::from_secs(256),
        "took {elapsed:?}"
    );
    assert_eq!(work.calls(), 500);
    assert_eq!(work.peak.load(Ordering::SeqCst), 2);

    let counts = app.counts(MediaKind::Photo).await;
    assert_eq!(counts.failed, 0);
    assert_eq!(counts.pending, 0);
    app.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_never_exceeds_slot_count() {
    let mut config = test_config();
    config.worker.concurrency = 3;

    let work = TimedWork::new(Duration::from_millis(700));
    let app = TestHarness::start(config, work.clone());
    for id in app.seed(MediaKind::Video, 20) {
        app.process(id, MediaKind::Video).await;
    }

    assert!(
        app.wait_for_counts(MediaKind::Video, Duration::from_secs(60), |c| c.processed == 20)
            .await
    );
    assert_eq!(work.peak.load(Ordering::SeqCst), 3);
    app.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_delivery_processes_item_once() {
    let work = TimedWork::new(Duration::from_millis(100));
    let app = TestHarness::start(test_config(), work.clone());
    let id = app.seed(MediaKind::Photo, 1)[0];

    app.process(id, MediaKind::Photo).await;
    app.process(id, MediaKind::Photo).await;

    assert!(
        app.wait_for_counts(MediaKind::Photo, Duration::from_secs(30), |c| c.processed == 1)
            .await
    );
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(work.calls(), 1);
    let stats = app.broker_stats().await;
    assert_eq!(stats.ready + stats.delayed + stats.in_flight, 0);
    assert_eq!(
        app.store.get(id).unwrap().processing_status,
        ProcessingStatus::Processed
    );
    app.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_fails_item_after_one_attempt() {
    let work = FailingWork::new(WorkError::Permanent("unsupported codec".to_string()));
    let app = TestHarness::start(test_config(), work.clone());
    let id = app.seed(MediaKind::Video, 1)[0];
    app.process(id, MediaKind::Video).await;

    assert!(
        app.wait_for_counts(MediaKind::Video, Duration::from_secs(30), |c| c.failed == 1)
            .await
    );
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(work.calls(), 1);
    let item = app.store.get(id).unwrap();
    assert_eq!(item.processing_error.as_deref(), Some("unsupported codec"));
    assert_eq!(app.broker_stats().await.delayed, 0);
    app.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_until_exhausted() {
    let mut config = test_config();
    config.processing.max_attempts = 2;

    let work = FailingWork::new(WorkError::Transient("model busy".to_string()));
    let app = TestHarness::start(config, work.clone());
    let id = app.seed(MediaKind::Photo, 1)[0];
    app.process(id, MediaKind::Photo).await;

    assert!(
        app.wait_for_counts(MediaKind::Photo, Duration::from_secs(60), |c| c.failed == 1)
            .await
    );

    assert_eq!(work.calls(), 2);
    let item = app.store.get(id).unwrap();
    assert!(item.processing_error.unwrap().contains("model busy"));
    let stats = app.broker_stats().await;
    assert_eq!(stats.ready + stats.delayed + stats.in_flight, 0);
    app.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_soft_limit_cancels_body_and_nacks() {
    let mut config = test_config();
    config.processing.retry_delay_seconds = 60;
    config.processing.max_retry_delay_seconds = 60;

    let work = TimedWork::new(Duration::from_secs(3));
    let app = TestHarness::start(config, work.clone());
    let id = app.seed(MediaKind::Photo, 1)[0];
    let job_id = app.process(id, MediaKind::Photo).await;

    assert!(
        app.wait_until(Duration::from_secs(30), |app| {
            work.cancelled.load(Ordering::SeqCst) == 1
                && app.broker.get(job_id).is_some_and(|job| job.attempts == 1)
        })
        .await
    );

    assert_eq!(app.broker_stats().await.delayed, 1);
    let item = app.store.get(id).unwrap();
    assert_eq!(item.processing_status, ProcessingStatus::Pending);
    assert_eq!(item.claimed_by, None);
    app.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_discovery_cut_by_soft_limit_is_acked_not_redelivered() {
    let config = test_config();
    let broker = MemoryBroker::new(config.broker.visibility_timeout());
    let slow = SlowEnqueueBroker::new(broker.clone(), Duration::from_millis(500));

    let work = TimedWork::new(Duration::from_millis(10));
    let app = TestHarness::start_with_broker(config, work.clone(), broker, slow);
    app.seed(MediaKind::Photo, 10);
    let job_id = app.discover(MediaKind::Photo, 500).await;

    assert!(
        app.wait_until(Duration::from_secs(10), |app| app.broker.get(job_id).is_none())
            .await,
        "discovery job should be acked"
    );

    // Long enough for any requeue delay to elapse.
    tokio::time::sleep(Duration::from_secs(30)).await;
    let counts = app.counts(MediaKind::Photo).await;
    assert!(counts.processed >= 1 && counts.processed < 10);
    assert_eq!(counts.processed + counts.pending, 10);
    assert_eq!(work.calls() as u64, counts.processed);
    assert_eq!(app.broker_stats().await, BrokerStats::default());
    app.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_broker_outage_during_dequeue_is_retried() {
    let config = test_config();
    let broker = MemoryBroker::new(config.broker.visibility_timeout());
    let flaky = FlakyBroker::new(broker.clone(), 4);

    let work = TimedWork::new(Duration::from_millis(100));
    let app = TestHarness::start_with_broker(config, work.clone(), broker, flaky.clone());
    let id = app.seed(MediaKind::Photo, 1)[0];
    app.process(id, MediaKind::Photo).await;

    assert!(
        app.wait_for_counts(MediaKind::Photo, Duration::from_secs(60), |c| c.processed == 1)
            .await
    );
    assert_eq!(flaky.failed_calls.load(Ordering::SeqCst), 4);
    assert_eq!(app.counts(MediaKind::Photo).await.failed, 0);
    assert_eq!(
        app.store.get(id).unwrap().processing_status,
        ProcessingStatus::Processed
    );
    app.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_discovery_only_touches_requested_kind() {
    let work = TimedWork::new(Duration::from_millis(10));
    let app = TestHarness::start(test_config(), work.clone());
    app.seed(MediaKind::Photo, 3);
    app.seed(MediaKind::Video, 2);

    app.discover(MediaKind::Video, 500).await;

    assert!(
        app.wait_for_counts(MediaKind::Video, Duration::from_secs(30), |c| c.processed == 2)
            .await
    );
    assert_eq!(app.counts(MediaKind::Photo).await.pending, 3);
    assert_eq!(work.calls(), 2);
    app.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_returns_with_idle_workers() {
    let work = Arc::new(helpers::HangOnceWork::default());
    let app = TestHarness::start(test_config(), work);
    tokio::time::sleep(Duration::from_secs(1)).await;
    app.stop().await;
}
