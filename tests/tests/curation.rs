//! Tests for monthly curation cycles.

use std::sync::Arc;
use std::time::Duration;

use integration_tests::mocks::{KvWrite, MemoryKeyValue};
use integration_tests::setup::{curator_config, CurationContext, LOCK_KEY};
use keyvalue::KeyValueStore;
use worker::{Curator, CycleOutcome, DistributedLock};
use workers_core::{MonthlyAggregate, YearMonth};

const MARCH: YearMonth = YearMonth {
    year: 2024,
    month: 3,
};

fn aggregate(store: &MemoryKeyValue, key: &str) -> Option<MonthlyAggregate> {
    store
        .value(key)
        .map(|raw| serde_json::from_str(&raw).expect("aggregate should be JSON"))
}

/// No markers: nothing written, nothing deleted, lock released
#[tokio::test]
async fn test_empty_month_is_noop() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-4-1 login"]);

    let report = ctx.curator.run_cycle(MARCH).await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Empty);
    assert_eq!(report.attempts, 1);
    assert!(ctx.store.value("2024-3").is_none());
    assert!(ctx
        .store
        .writes()
        .iter()
        .all(|w| !matches!(w, KvWrite::Delete { .. })));
    assert_eq!(ctx.store.value("2024-4-1 login").as_deref(), Some("true"));
    assert_eq!(ctx.store.value(LOCK_KEY).as_deref(), Some("0"));
}

/// Markers fold into one aggregate, duplicates kept, sources deleted
#[tokio::test]
async fn test_markers_fold_into_aggregate() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-3-1 login", "2024-3-2 login", "2024-3-5 logout"]);

    let report = ctx.curator.run_cycle(MARCH).await.unwrap();

    assert_eq!(
        report.outcome,
        CycleOutcome::Curated {
            markers: 3,
            events: vec!["login".into(), "login".into(), "logout".into()],
        }
    );
    assert_eq!(
        aggregate(&ctx.store, "2024-3").unwrap().events,
        vec!["login", "login", "logout"]
    );
    assert_eq!(
        ctx.store.value("2024-3").as_deref(),
        Some(r#"{"Events":["login","login","logout"]}"#)
    );
    for key in ["2024-3-1 login", "2024-3-2 login", "2024-3-5 logout"] {
        assert!(ctx.store.value(key).is_none(), "{} should be deleted", key);
    }
    assert!(!ctx.lock.is_held());
    assert_eq!(ctx.store.value(LOCK_KEY).as_deref(), Some("0"));
}

/// Events are ordered by day of month, then name
#[tokio::test]
async fn test_aggregate_order_is_by_day() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-3-10 alpha", "2024-3-2 zulu", "2024-3-2 bravo"]);

    ctx.curator.run_cycle(MARCH).await.unwrap();

    assert_eq!(
        aggregate(&ctx.store, "2024-3").unwrap().events,
        vec!["bravo", "zulu", "alpha"]
    );
}

/// Only the target month's markers are touched
#[tokio::test]
async fn test_other_months_untouched() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-1-3 login", "2024-10-1 login", "2023-1-3 login"]);

    let report = ctx.curator.run_cycle(YearMonth::new(2024, 1)).await.unwrap();

    assert!(matches!(report.outcome, CycleOutcome::Curated { markers: 1, .. }));
    assert!(ctx.store.value("2024-1-3 login").is_none());
    assert!(ctx.store.value("2024-10-1 login").is_some());
    assert!(ctx.store.value("2023-1-3 login").is_some());
}

/// Malformed marker keys add no events but are deleted with the rest
#[tokio::test]
async fn test_malformed_markers_ignored() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-3-4 login", "2024-3-4 two words", "2024-3-x login"]);

    let report = ctx.curator.run_cycle(MARCH).await.unwrap();

    assert_eq!(
        report.outcome,
        CycleOutcome::Curated {
            markers: 3,
            events: vec!["login".into()],
        }
    );
    assert_eq!(aggregate(&ctx.store, "2024-3").unwrap().events, vec!["login"]);
    for key in ["2024-3-4 login", "2024-3-4 two words", "2024-3-x login"] {
        assert!(ctx.store.value(key).is_none(), "{} should be deleted", key);
    }
}

/// A month holding only malformed keys still commits, and the next cycle is empty
#[tokio::test]
async fn test_malformed_only_month_is_cleared() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-3-4 two words", "2024-3-x login"]);

    let report = ctx.curator.run_cycle(MARCH).await.unwrap();

    assert_eq!(
        report.outcome,
        CycleOutcome::Curated {
            markers: 2,
            events: vec![],
        }
    );
    assert_eq!(ctx.store.value("2024-3").as_deref(), Some(r#"{"Events":[]}"#));
    assert!(ctx.store.value("2024-3-4 two words").is_none());
    assert!(ctx.store.value("2024-3-x login").is_none());

    let again = ctx.curator.run_cycle(MARCH).await.unwrap();
    assert_eq!(again.outcome, CycleOutcome::Empty);
    assert_eq!(ctx.store.value(LOCK_KEY).as_deref(), Some("0"));
}

/// Two failures then success: three attempts, doubling backoff, one release
#[tokio::test(start_paused = true)]
async fn test_retry_with_doubling_backoff() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-3-1 login"]);
    ctx.store.fail_next_keys(2);

    let start = tokio::time::Instant::now();
    let report = ctx.curator.run_cycle(MARCH).await.unwrap();

    assert!(matches!(report.outcome, CycleOutcome::Curated { markers: 1, .. }));
    assert_eq!(report.attempts, 3);
    assert_eq!(
        report.backoffs,
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert!(start.elapsed() >= Duration::from_secs(6));
    assert_eq!(ctx.store.commit_count(LOCK_KEY), 1);
    assert_eq!(ctx.store.set_count(LOCK_KEY, "0"), 1);
    assert_eq!(ctx.store.value(LOCK_KEY).as_deref(), Some("0"));
}

/// Exhausted retries abandon the cycle, keep markers, release the lock
#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_abandon_cycle() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-3-1 login"]);
    ctx.store.fail_next_keys(10);

    let report = ctx.curator.run_cycle(MARCH).await.unwrap();

    assert!(matches!(report.outcome, CycleOutcome::Abandoned { .. }));
    assert_eq!(report.attempts, 3);
    assert_eq!(report.backoffs.len(), 2);
    assert!(ctx.store.value("2024-3").is_none());
    assert!(ctx.store.value("2024-3-1 login").is_some());
    assert_eq!(ctx.store.set_count(LOCK_KEY, "0"), 1);
}

/// A failed delete after the aggregate write is retried; the rewrite overwrites
#[tokio::test(start_paused = true)]
async fn test_partial_commit_rewrites_aggregate() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-3-1 login", "2024-3-2 logout"]);
    ctx.store.fail_next_deletes(1);

    let report = ctx.curator.run_cycle(MARCH).await.unwrap();

    assert_eq!(report.attempts, 2);
    assert_eq!(
        aggregate(&ctx.store, "2024-3").unwrap().events,
        vec!["login", "logout"]
    );
    assert_eq!(ctx.store.set_count("2024-3", r#"{"Events":["login","logout"]}"#), 2);
    assert!(ctx.store.value("2024-3-1 login").is_none());
}

/// A lock held elsewhere skips the cycle without reading markers
#[tokio::test]
async fn test_held_lock_skips_cycle() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-3-1 login"]);
    ctx.store.seed(LOCK_KEY, "1");

    let report = ctx.curator.run_cycle(MARCH).await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Skipped);
    assert_eq!(report.attempts, 0);
    assert!(ctx.store.value("2024-3-1 login").is_some());
    assert_eq!(ctx.store.value(LOCK_KEY).as_deref(), Some("1"));
}

/// Racing curators on one store: the loser neither aggregates nor deletes
#[tokio::test]
async fn test_racing_curators_single_curation() {
    let ctx = CurationContext::new().await;
    ctx.seed_markers(&["2024-3-1 login", "2024-3-2 login", "2024-3-5 logout"]);

    let shared: Arc<dyn KeyValueStore> = Arc::new(ctx.store.clone());
    let rival = Curator::new(
        shared.clone(),
        DistributedLock::new(shared, LOCK_KEY, None),
        curator_config(),
    );

    let (a, b) = tokio::join!(ctx.curator.run_cycle(MARCH), rival.run_cycle(MARCH));
    let outcomes = [a.unwrap().outcome, b.unwrap().outcome];

    let curated = outcomes
        .iter()
        .filter(|o| matches!(o, CycleOutcome::Curated { .. }))
        .count();
    assert_eq!(curated, 1);
    assert!(outcomes.contains(&CycleOutcome::Skipped));

    let deletes = ctx
        .store
        .writes()
        .iter()
        .filter(|w| matches!(w, KvWrite::Delete { .. }))
        .count();
    assert_eq!(deletes, 3);
    assert_eq!(aggregate(&ctx.store, "2024-3").unwrap().events.len(), 3);
}
