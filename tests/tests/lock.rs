//! Tests for the optimistic fleet lock.

use std::sync::Arc;
use std::time::Duration;

use integration_tests::mocks::{KvWrite, MemoryKeyValue};
use integration_tests::setup::LOCK_KEY;
use keyvalue::KeyValueStore;
use worker::DistributedLock;

fn lock_on(store: &MemoryKeyValue, lease: Option<Duration>) -> DistributedLock {
    let shared: Arc<dyn KeyValueStore> = Arc::new(store.clone());
    DistributedLock::new(shared, LOCK_KEY, lease)
}

/// Of two racing acquirers on a released record, exactly one wins
#[tokio::test]
async fn test_racing_acquirers_single_winner() {
    let store = MemoryKeyValue::new();
    store.seed(LOCK_KEY, "0");
    let first = lock_on(&store, None);
    let second = lock_on(&store, None);

    let (a, b) = tokio::join!(first.try_acquire(), second.try_acquire());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a ^ b, "exactly one acquirer must win, got {} and {}", a, b);
    assert_eq!(first.is_held(), a);
    assert_eq!(second.is_held(), b);
    assert_eq!(store.commit_count(LOCK_KEY), 1);
    assert_eq!(store.value(LOCK_KEY).as_deref(), Some("1"));
}

/// An acquired record makes try_acquire return false without writing
#[tokio::test]
async fn test_acquired_record_is_not_taken() {
    let store = MemoryKeyValue::new();
    store.seed(LOCK_KEY, "1");
    let lock = lock_on(&store, None);

    assert!(!lock.try_acquire().await.unwrap());
    assert!(!lock.is_held());
    assert!(store.writes().is_empty());
}

/// A write landing between the watched read and the commit aborts it
#[tokio::test]
async fn test_concurrent_write_aborts_acquire() {
    let store = MemoryKeyValue::new();
    store.seed(LOCK_KEY, "0");
    store.interfere_after_watch("0");
    let lock = lock_on(&store, None);

    assert!(!lock.try_acquire().await.unwrap());
    assert!(!lock.is_held());
    assert_eq!(store.commit_count(LOCK_KEY), 0);
    assert_eq!(store.value(LOCK_KEY).as_deref(), Some("0"));
}

/// A missing record reads as released
#[tokio::test]
async fn test_missing_record_is_released() {
    let store = MemoryKeyValue::new();
    let lock = lock_on(&store, None);

    assert!(lock.try_acquire().await.unwrap());
    assert_eq!(store.value(LOCK_KEY).as_deref(), Some("1"));
}

/// Bootstrap never clobbers a live holder
#[tokio::test]
async fn test_ensure_initialized_keeps_existing_value() {
    let store = MemoryKeyValue::new();
    let lock = lock_on(&store, None);

    assert!(lock.ensure_initialized().await.unwrap());
    assert_eq!(store.value(LOCK_KEY).as_deref(), Some("0"));

    store.seed(LOCK_KEY, "1");
    assert!(!lock.ensure_initialized().await.unwrap());
    assert_eq!(store.value(LOCK_KEY).as_deref(), Some("1"));
}

/// A configured lease rides on the acquiring commit
#[tokio::test]
async fn test_lease_is_applied_on_acquire() {
    let store = MemoryKeyValue::new();
    store.seed(LOCK_KEY, "0");
    let lock = lock_on(&store, Some(Duration::from_secs(600)));

    assert!(lock.try_acquire().await.unwrap());
    assert_eq!(
        store.writes(),
        vec![KvWrite::Commit {
            key: LOCK_KEY.to_string(),
            value: "1".to_string(),
            ttl: Some(Duration::from_secs(600)),
        }]
    );
}

/// Release is idempotent; release_if_held only releases for the holder
#[tokio::test]
async fn test_release_semantics() {
    let store = MemoryKeyValue::new();
    store.seed(LOCK_KEY, "0");
    let holder = lock_on(&store, None);
    let bystander = lock_on(&store, None);

    assert!(holder.try_acquire().await.unwrap());
    assert!(!bystander.release_if_held().await.unwrap());
    assert_eq!(store.value(LOCK_KEY).as_deref(), Some("1"));

    assert!(holder.release_if_held().await.unwrap());
    assert!(!holder.is_held());
    holder.release().await.unwrap();
    assert_eq!(store.value(LOCK_KEY).as_deref(), Some("0"));

    // Released again, so a fresh acquire succeeds.
    assert!(bystander.try_acquire().await.unwrap());
}
