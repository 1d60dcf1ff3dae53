//! Common wiring for worker tests.

use std::sync::Arc;
use std::time::Duration;

use broker::DeliverySource;
use worker::{
    ConsumerWorker, ConsumerWorkerConfig, Curator, CuratorConfig, DistributedLock, MetricHandler,
};

use crate::mocks::MemoryKeyValue;

pub const LOCK_KEY: &str = "DIST_LOCK";

/// Consumer config with no pauses, so tests run in real time.
pub fn fast_consumer_config() -> ConsumerWorkerConfig {
    ConsumerWorkerConfig {
        handler_timeout_ms: 1_000,
        requeue_delay_ms: 0,
        source_error_delay_ms: 0,
    }
}

pub fn consumer(
    source: Arc<dyn DeliverySource>,
    handler: Arc<dyn MetricHandler>,
) -> ConsumerWorker {
    ConsumerWorker::with_config(source, handler, fast_consumer_config())
}

/// Curator config with the default retry policy and a short restart delay.
pub fn curator_config() -> CuratorConfig {
    CuratorConfig {
        retry_count: 3,
        backoff_base_ms: 2_000,
        lock_key: LOCK_KEY.to_string(),
        restart_delay_ms: 10,
        ..Default::default()
    }
}

/// An events-role curation stack over one in-memory store.
pub struct CurationContext {
    pub store: MemoryKeyValue,
    pub lock: DistributedLock,
    pub curator: Arc<Curator>,
}

impl CurationContext {
    pub async fn new() -> Self {
        Self::with_config(curator_config()).await
    }

    /// Builds the stack and initializes the lock record as released.
    pub async fn with_config(config: CuratorConfig) -> Self {
        let store = MemoryKeyValue::new();
        let shared: Arc<dyn keyvalue::KeyValueStore> = Arc::new(store.clone());
        let lock = DistributedLock::new(
            shared.clone(),
            config.lock_key.clone(),
            config.lock_lease_secs.map(Duration::from_secs),
        );
        lock.ensure_initialized()
            .await
            .expect("Failed to initialize lock record");

        let curator = Arc::new(Curator::new(shared, lock.clone(), config));
        Self {
            store,
            lock,
            curator,
        }
    }

    /// Seeds daily markers.
    pub fn seed_markers(&self, keys: &[&str]) {
        for key in keys {
            self.store.seed(key, workers_core::MARKER_PRESENT);
        }
    }
}
