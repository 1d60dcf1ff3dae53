//! Internal metrics collection.
//!
//! Counters live in process memory and are reported as a structured log
//! line on a fixed interval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the workers.
#[derive(Debug, Default)]
pub struct Metrics {
    // Consumption
    pub messages_received: Counter,
    pub messages_acked: Counter,
    pub messages_requeued: Counter,
    pub messages_rejected: Counter,
    pub decode_errors: Counter,
    pub handler_timeouts: Counter,
    pub source_errors: Counter,

    // Handlers
    pub accounts_created: Counter,
    pub accounts_existing: Counter,
    pub markers_recorded: Counter,
    pub logs_archived: Counter,

    // Curation
    pub curation_cycles: Counter,
    pub curation_skipped: Counter,
    pub curation_empty: Counter,
    pub curation_completed: Counter,
    pub curation_abandoned: Counter,
    pub curation_retries: Counter,
    pub markers_curated: Counter,
    pub curator_restarts: Counter,

    // Latency histograms
    pub handler_latency_ms: Histogram,
    pub curation_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub messages_received: u64,
    pub messages_acked: u64,
    pub messages_requeued: u64,
    pub messages_rejected: u64,
    pub decode_errors: u64,
    pub accounts_created: u64,
    pub markers_recorded: u64,
    pub logs_archived: u64,
    pub curation_cycles: u64,
    pub curation_completed: u64,
    pub curation_abandoned: u64,
    pub curator_restarts: u64,
    pub handler_latency_mean_ms: f64,
    pub curation_latency_mean_ms: f64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            messages_received: self.messages_received.get(),
            messages_acked: self.messages_acked.get(),
            messages_requeued: self.messages_requeued.get(),
            messages_rejected: self.messages_rejected.get(),
            decode_errors: self.decode_errors.get(),
            accounts_created: self.accounts_created.get(),
            markers_recorded: self.markers_recorded.get(),
            logs_archived: self.logs_archived.get(),
            curation_cycles: self.curation_cycles.get(),
            curation_completed: self.curation_completed.get(),
            curation_abandoned: self.curation_abandoned.get(),
            curator_restarts: self.curator_restarts.get(),
            handler_latency_mean_ms: self.handler_latency_ms.mean(),
            curation_latency_mean_ms: self.curation_latency_ms.mean(),
        }
    }
}

/// Emits a snapshot as a single structured log line.
pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    tracing::info!(
        received = snapshot.messages_received,
        acked = snapshot.messages_acked,
        requeued = snapshot.messages_requeued,
        rejected = snapshot.messages_rejected,
        decode_errors = snapshot.decode_errors,
        accounts_created = snapshot.accounts_created,
        markers_recorded = snapshot.markers_recorded,
        logs_archived = snapshot.logs_archived,
        curation_cycles = snapshot.curation_cycles,
        curation_completed = snapshot.curation_completed,
        curation_abandoned = snapshot.curation_abandoned,
        curator_restarts = snapshot.curator_restarts,
        handler_latency_mean_ms = snapshot.handler_latency_mean_ms,
        "Metrics snapshot"
    );
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
