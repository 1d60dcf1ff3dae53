//! Tests for curator fault recovery.

use std::time::Duration;

use chrono::Utc;
use integration_tests::setup::{curator_config, CurationContext, LOCK_KEY};
use worker::{CuratorConfig, CuratorSupervisor, SupervisorExit};
use workers_core::YearMonth;

fn budget(max_restarts: u32) -> CuratorConfig {
    CuratorConfig {
        max_restarts: Some(max_restarts),
        ..curator_config()
    }
}

/// A panic while holding the lock is caught, the lock released, the loop respawned
#[tokio::test(start_paused = true)]
async fn test_panic_releases_lock_and_respawns() {
    let ctx = CurationContext::with_config(budget(2)).await;
    ctx.store.panic_next_keys(u32::MAX);

    let exit = CuratorSupervisor::new(ctx.curator.clone()).run().await;

    assert_eq!(exit, SupervisorExit::BudgetExhausted { restarts: 2 });
    // One acquire and one supervisor release per fault.
    assert_eq!(ctx.store.commit_count(LOCK_KEY), 3);
    assert_eq!(ctx.store.set_count(LOCK_KEY, "0"), 3);
    assert_eq!(ctx.store.value(LOCK_KEY).as_deref(), Some("0"));
    assert!(!ctx.lock.is_held());
}

/// Errors out of the curator loop are respawned too
#[tokio::test(start_paused = true)]
async fn test_error_respawns_until_budget() {
    let ctx = CurationContext::with_config(budget(1)).await;
    ctx.store.fail_next_watches(2);

    let exit = CuratorSupervisor::new(ctx.curator.clone()).run().await;

    assert_eq!(exit, SupervisorExit::BudgetExhausted { restarts: 1 });
    // The lock was never taken, so nothing needed releasing.
    assert_eq!(ctx.store.set_count(LOCK_KEY, "0"), 0);
}

/// After a faulted cycle the respawned loop curates normally
#[tokio::test(start_paused = true)]
async fn test_respawned_curator_completes_cycle() {
    let ctx = CurationContext::new().await;
    let month = YearMonth::of(Utc::now());
    let marker = format!("{}-15 login", month);
    ctx.seed_markers(&[marker.as_str()]);
    ctx.store.panic_next_keys(1);

    let supervisor = CuratorSupervisor::new(ctx.curator.clone());
    let handle = tokio::spawn(async move { supervisor.run().await });

    let mut curated = false;
    for _ in 0..120 {
        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        if ctx.store.value(&month.aggregate_key()).is_some() {
            curated = true;
            break;
        }
    }
    handle.abort();

    assert!(curated, "respawned curator should curate {}", month);
    assert!(ctx.store.value(&marker).is_none());
    assert_eq!(ctx.store.value(LOCK_KEY).as_deref(), Some("0"));
}
