//! Per-metric handlers driven by the consumption loop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use workers_core::{Metric, Result};

/// Processing step applied to every decoded metric.
///
/// Handlers must be idempotent: the loop delivers at least once, so the same
/// metric can reach `handle` again after a requeue.
#[async_trait]
pub trait MetricHandler: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, metric: &Metric, now: DateTime<Utc>) -> Result<()>;
}
