use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio_test::assert_ok;
use tower::ServiceExt;

use booking_queue_cell::*;

#[tokio::test]
async fn test_units_run_in_submission_order() {
    let queue = SerialWorkQueue::start();
    let log = Arc::new(Mutex::new(Vec::new()));

    let submissions = (0..20).map(|i| {
        let log = Arc::clone(&log);
        queue.submit(move || async move {
            // later units finish faster, so only FIFO keeps the log sorted
            tokio::time::sleep(Duration::from_millis(20 - i)).await;
            log.lock().await.push(i);
            i
        })
    });

    let results: Vec<u64> = join_all(submissions)
        .await
        .into_iter()
        .map(|r| r.expect("unit should complete"))
        .collect();

    assert_eq!(results, (0..20).collect::<Vec<_>>());
    assert_eq!(*log.lock().await, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_at_most_one_unit_runs_at_a_time() {
    let queue = Arc::new(SerialWorkQueue::start());
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            queue
                .submit(move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(queue.stats().completed_jobs, 10);
}

#[tokio::test]
async fn test_unit_failure_is_returned_to_submitter() {
    let queue = SerialWorkQueue::start();

    let outcome: Result<Result<u32, String>, BookingQueueError> = queue
        .submit(|| async { Err("slot overlaps".to_string()) })
        .await;

    assert_eq!(outcome.unwrap(), Err("slot overlaps".to_string()));
}

#[tokio::test]
async fn test_panicking_unit_is_aborted_and_queue_survives() {
    let queue = SerialWorkQueue::start();

    let aborted = queue
        .submit(|| async {
            panic!("boom");
        })
        .await;
    assert_matches!(aborted, Err(BookingQueueError::UnitAborted { .. }));

    let next = assert_ok!(queue.submit(|| async { 7 }).await);
    assert_eq!(next, 7);

    let stats = queue.stats();
    assert_eq!(stats.aborted_jobs, 1);
    assert_eq!(stats.completed_jobs, 1);
}

#[tokio::test]
async fn test_timeout_abandons_wait_but_unit_still_runs() {
    let queue = SerialWorkQueue::start();
    let finished = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&finished);
    let outcome = queue
        .submit_with_timeout(
            move || async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                flag.store(true, Ordering::SeqCst);
            },
            Duration::from_millis(10),
        )
        .await;
    assert_matches!(outcome, Err(BookingQueueError::WorkerTimeout { timeout_ms: 10, .. }));

    // runs after the abandoned unit, so it observes its side effect
    let observed = {
        let flag = Arc::clone(&finished);
        queue.submit(move || async move { flag.load(Ordering::SeqCst) }).await.unwrap()
    };
    assert!(observed);
}

#[tokio::test]
async fn test_shutdown_drains_then_rejects() {
    let queue = Arc::new(SerialWorkQueue::start());
    let counter = Arc::new(AtomicUsize::new(0));

    let mut pending = Vec::new();
    for _ in 0..5 {
        let queue = Arc::clone(&queue);
        let counter = Arc::clone(&counter);
        pending.push(tokio::spawn(async move {
            queue
                .submit(move || async move {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await
        }));
    }
    // let every producer enqueue before shutting down
    tokio::time::sleep(Duration::from_millis(5)).await;

    queue.shutdown().await.unwrap();
    for handle in pending {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 5);

    let rejected = queue.submit(|| async {}).await;
    assert_matches!(rejected, Err(BookingQueueError::QueueClosed));
    assert_eq!(queue.stats().queue_health, QueueHealth::Stopped);

    // idempotent
    queue.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_queue_stats_endpoint() {
    let queue = Arc::new(SerialWorkQueue::start());
    queue.submit(|| async {}).await.unwrap();

    let app = create_booking_queue_router(Arc::clone(&queue));
    let request = Request::builder()
        .method("GET")
        .uri("/stats")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["completed_jobs"], 1);
    assert_eq!(json["queue_health"]["state"], "healthy");
}
