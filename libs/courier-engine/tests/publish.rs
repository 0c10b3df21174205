mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use courier_api::{EventRecord, TransmissionError};
use courier_codec::EncodingError;
use courier_engine::{Publisher, PublisherConfig, SubmitError};

use common::{event, fixture, Flaky, Stalled, TOPIC};

#[tokio::test]
async fn test_publish_acknowledged_with_position() {
    let fx = fixture(3);
    let publisher: Publisher<EventRecord> =
        Publisher::new(fx.log.clone(), fx.codec.clone(), fx.v1.clone(), PublisherConfig::new(TOPIC))
            .unwrap();

    let receipt = publisher.submit(&event("e1")).unwrap().await;

    assert!(receipt.is_acknowledged(), "{receipt:?}");
    assert_eq!(receipt.event_id, "e1");
    assert_eq!(receipt.offset, Some(0));
    assert_eq!(receipt.attempts, 1);
    let partition = receipt.partition.unwrap();
    assert!(partition < 3);
    assert_eq!(fx.log.end_offset(TOPIC, partition).await.unwrap(), 1);

    publisher.shutdown().await;
}

#[tokio::test]
async fn test_missing_email_rejected_synchronously() {
    let fx = fixture(3);
    let publisher: Publisher<EventRecord> =
        Publisher::new(fx.log.clone(), fx.codec.clone(), fx.v1.clone(), PublisherConfig::new(TOPIC))
            .unwrap();

    let mut incomplete = event("e1");
    incomplete.email = None;

    let err = publisher.submit(&incomplete).unwrap_err();
    assert_eq!(
        err,
        SubmitError::Encoding(EncodingError::MissingField { field: "email".into() })
    );

    publisher.shutdown().await;
    for partition in 0..3 {
        assert_eq!(fx.log.end_offset(TOPIC, partition).await.unwrap(), 0);
    }
}

#[tokio::test]
async fn test_empty_id_rejected() {
    let fx = fixture(1);
    let publisher: Publisher<EventRecord> =
        Publisher::new(fx.log.clone(), fx.codec.clone(), fx.v1.clone(), PublisherConfig::new(TOPIC))
            .unwrap();

    assert_eq!(publisher.submit(&event("")).unwrap_err(), SubmitError::EmptyId);
}

#[tokio::test]
async fn test_same_key_keeps_submission_order() {
    let fx = fixture(3);
    let mut config = PublisherConfig::new(TOPIC);
    config.lanes = 4;
    let publisher: Publisher<EventRecord> =
        Publisher::new(fx.log.clone(), fx.codec.clone(), fx.v1.clone(), config).unwrap();

    let a = publisher.submit_with_key(&event("a"), "user-7").unwrap();
    let b = publisher.submit_with_key(&event("b"), "user-7").unwrap();
    let (a, b) = (a.await, b.await);

    assert_eq!(a.partition, b.partition);
    assert!(a.offset.unwrap() < b.offset.unwrap());
}

#[tokio::test]
async fn test_stalled_transmission_times_out() {
    let fx = fixture(1);
    let mut config = PublisherConfig::new(TOPIC);
    config.delivery_timeout_ms = 50;
    let publisher: Publisher<EventRecord> =
        Publisher::new(Arc::new(Stalled), fx.codec.clone(), fx.v1.clone(), config).unwrap();

    let receipt = publisher.submit(&event("e1")).unwrap().await;

    assert_eq!(
        receipt.failure(),
        Some(&TransmissionError::Timeout(Duration::from_millis(50)))
    );
    assert_eq!(receipt.attempts, 1);
    assert_eq!(receipt.partition, None);
}

#[tokio::test]
async fn test_transient_failures_retried_with_policy() {
    let fx = fixture(1);
    let flaky = Flaky::new(fx.log.clone(), 2);
    let mut config = PublisherConfig::new(TOPIC);
    config.max_retries = 3;
    config.backoff_ms = 1;
    config.max_backoff_ms = 5;
    let publisher: Publisher<EventRecord> =
        Publisher::new(flaky.clone(), fx.codec.clone(), fx.v1.clone(), config).unwrap();

    let receipt = publisher.submit(&event("e1")).unwrap().await;

    assert!(receipt.is_acknowledged(), "{receipt:?}");
    assert_eq!(receipt.attempts, 3);
    assert_eq!(flaky.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_no_retry_by_default() {
    let fx = fixture(1);
    let flaky = Flaky::new(fx.log.clone(), 1);
    let publisher: Publisher<EventRecord> =
        Publisher::new(flaky.clone(), fx.codec.clone(), fx.v1.clone(), PublisherConfig::new(TOPIC))
            .unwrap();

    let receipt = publisher.submit(&event("e1")).unwrap().await;

    assert_eq!(
        receipt.failure(),
        Some(&TransmissionError::Unreachable("flaky".into()))
    );
    assert_eq!(receipt.attempts, 1);
    assert_eq!(fx.log.end_offset(TOPIC, 0).await.unwrap(), 0);
}

#[tokio::test]
async fn test_rejection_is_not_retried() {
    let fx = fixture(1);
    let mut config = PublisherConfig::new("unknown-topic");
    config.max_retries = 5;
    config.backoff_ms = 1;
    let publisher: Publisher<EventRecord> =
        Publisher::new(fx.log.clone(), fx.codec.clone(), fx.v1.clone(), config).unwrap();

    let receipt = publisher.submit(&event("e1")).unwrap().await;

    assert!(matches!(receipt.failure(), Some(TransmissionError::Rejected(_))));
    assert_eq!(receipt.attempts, 1);
}

#[tokio::test]
async fn test_full_queue_fails_immediately() {
    let fx = fixture(1);
    let mut config = PublisherConfig::new(TOPIC);
    config.queue_capacity = 1;
    config.delivery_timeout_ms = 60_000;
    let publisher: Publisher<EventRecord> =
        Publisher::new(Arc::new(Stalled), fx.codec.clone(), fx.v1.clone(), config).unwrap();

    let _in_flight = publisher.submit(&event("e1")).unwrap();
    // Let the lane pick up e1 and block on it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let _queued = publisher.submit(&event("e2")).unwrap();
    let overflow = publisher.submit(&event("e3")).unwrap().await;

    assert_eq!(overflow.failure(), Some(&TransmissionError::QueueFull));
    assert_eq!(overflow.attempts, 0);
}

#[tokio::test]
async fn test_shutdown_drains_pending_submits() {
    let fx = fixture(3);
    let publisher: Publisher<EventRecord> =
        Publisher::new(fx.log.clone(), fx.codec.clone(), fx.v1.clone(), PublisherConfig::new(TOPIC))
            .unwrap();

    let handles: Vec<_> = (0..5)
        .map(|i| publisher.submit(&event(&format!("e{i}"))).unwrap())
        .collect();
    publisher.shutdown().await;

    for handle in handles {
        assert!(handle.await.is_acknowledged());
    }
}

#[tokio::test]
async fn test_closed_log_fails_delivery() {
    let fx = fixture(1);
    let publisher: Publisher<EventRecord> =
        Publisher::new(fx.log.clone(), fx.codec.clone(), fx.v1.clone(), PublisherConfig::new(TOPIC))
            .unwrap();
    fx.log.close();

    let receipt = publisher.submit(&event("e1")).unwrap().await;
    assert_eq!(
        receipt.failure(),
        Some(&TransmissionError::Unreachable("transport closed".into()))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_completion_runs_off_the_caller_thread() {
    let fx = fixture(3);
    let publisher: Publisher<EventRecord> =
        Publisher::new(fx.log.clone(), fx.codec.clone(), fx.v1.clone(), PublisherConfig::new(TOPIC))
            .unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    let caller = std::thread::scope(|s| {
        s.spawn(|| {
            let handle = publisher.submit(&event("e1")).unwrap();
            handle.on_complete(move |receipt| {
                let _ = tx.send((receipt, std::thread::current().id()));
            });
            std::thread::current().id()
        })
        .join()
        .unwrap()
    });

    let (receipt, completed_on) = tokio::time::timeout(common::WAIT, rx).await.unwrap().unwrap();
    assert!(receipt.is_acknowledged());
    assert_ne!(completed_on, caller);

    publisher.shutdown().await;
}
