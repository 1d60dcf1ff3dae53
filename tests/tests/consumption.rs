//! Tests for the consumption contract: decode, handle, settle.

use std::sync::Arc;
use std::time::Duration;

use integration_tests::fixtures::{garbage_delivery, metric_delivery};
use integration_tests::mocks::{CountingHandler, MemoryKeyValue, ScriptedSource};
use integration_tests::setup::{consumer, fast_consumer_config};
use worker::{ConsumerWorker, Disposition, EventRecorder};

/// Undecodable bodies are rejected, never acked, and never handled
#[tokio::test]
async fn test_malformed_body_is_rejected_not_handled() {
    let source = ScriptedSource::new(vec![
        garbage_delivery(1),
        metric_delivery(2, "alice", "login"),
    ]);
    let handler = Arc::new(CountingHandler::new());
    let worker = consumer(Arc::new(source.clone()), handler.clone());

    worker.run().await.expect("Consumer should exit cleanly");

    assert_eq!(source.rejected(), vec![1]);
    assert_eq!(source.acked(), vec![2]);
    assert!(source.requeued().is_empty());

    let calls = handler.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].username, "alice");
}

/// Non-JSON and wrong-shape bodies both count as decode failures
#[tokio::test]
async fn test_wrong_shape_body_is_rejected() {
    let delivery = broker::Delivery::new(7, br#"{"username":"alice","count":"many"}"#.to_vec());
    let source = ScriptedSource::new(vec![]);
    let handler = Arc::new(CountingHandler::new());
    let worker = consumer(Arc::new(source.clone()), handler.clone());

    let disposition = worker.process_delivery(&delivery).await.unwrap();

    assert_eq!(disposition, Disposition::Rejected);
    assert_eq!(source.rejected(), vec![7]);
    assert!(handler.calls().is_empty());
}

/// A store failure requeues the delivery; the redelivery succeeds
#[tokio::test]
async fn test_store_failure_requeues_then_acks() {
    let store = MemoryKeyValue::new();
    store.fail_next_sets(1);

    let source = ScriptedSource::new(vec![metric_delivery(1, "alice", "login")]);
    let recorder = Arc::new(EventRecorder::new(Arc::new(store.clone())));
    let worker = consumer(Arc::new(source.clone()), recorder);

    worker.run().await.unwrap();

    assert_eq!(source.requeued(), vec![1]);
    assert_eq!(source.acked(), vec![1]);
    assert!(source.rejected().is_empty());
    assert_eq!(store.keys_snapshot().len(), 1);
}

/// A handler exceeding the timeout is requeued, not acked
#[tokio::test(start_paused = true)]
async fn test_handler_timeout_requeues() {
    let source = ScriptedSource::new(vec![]);
    let handler = Arc::new(CountingHandler::stalling(Duration::from_secs(60)));
    let mut config = fast_consumer_config();
    config.handler_timeout_ms = 1_000;
    let worker = ConsumerWorker::with_config(Arc::new(source.clone()), handler.clone(), config);

    let delivery = metric_delivery(3, "bob", "logout");
    let disposition = worker.process_delivery(&delivery).await.unwrap();

    assert_eq!(disposition, Disposition::Requeued);
    assert_eq!(source.requeued(), vec![3]);
    assert!(source.acked().is_empty());
    assert_eq!(handler.calls().len(), 1);
}

/// Broker fetch failures reset the source and consumption continues
#[tokio::test]
async fn test_fetch_failures_reset_and_continue() {
    let source = ScriptedSource::new(vec![
        metric_delivery(1, "alice", "login"),
        metric_delivery(2, "bob", "login"),
    ]);
    source.fail_next_fetches(2);
    let handler = Arc::new(CountingHandler::new());
    let worker = consumer(Arc::new(source.clone()), handler.clone());

    worker.run().await.unwrap();

    assert_eq!(source.resets(), 2);
    assert_eq!(source.acked(), vec![1, 2]);
    assert_eq!(handler.calls().len(), 2);
}

/// Every delivery is settled exactly once
#[tokio::test]
async fn test_each_delivery_settled_once() {
    let source = ScriptedSource::new(vec![
        metric_delivery(1, "alice", "login"),
        garbage_delivery(2),
        metric_delivery(3, "carol", "purchase"),
        garbage_delivery(4),
    ]);
    let worker = consumer(Arc::new(source.clone()), Arc::new(CountingHandler::new()));

    worker.run().await.unwrap();

    let mut settled: Vec<i64> = source
        .acked()
        .into_iter()
        .chain(source.rejected())
        .collect();
    settled.sort();
    assert_eq!(settled, vec![1, 2, 3, 4]);
}
