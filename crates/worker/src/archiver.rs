//! Raw metric archival into hour buckets.

use crate::handler::MetricHandler;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse_client::LogStore;
use std::sync::Arc;
use telemetry::metrics;
use tracing::debug;
use workers_core::{hour_bucket, LogEntry, Metric, Result};

/// Appends each metric as its own row under the current hour bucket.
/// Inserts never read existing rows, so concurrent archivers cannot lose
/// each other's writes.
pub struct LogArchiver {
    logs: Arc<dyn LogStore>,
}

impl LogArchiver {
    pub fn new(logs: Arc<dyn LogStore>) -> Self {
        Self { logs }
    }

    pub async fn archive(&self, metric: &Metric, now: DateTime<Utc>) -> Result<()> {
        let entry = LogEntry::single(hour_bucket(now), metric.clone());
        let rows = self.logs.insert_entry(&entry).await?;

        metrics().logs_archived.inc_by(rows as u64);
        debug!(bucket = %entry.bucket, username = %metric.username, "Metric archived");
        Ok(())
    }
}

#[async_trait]
impl MetricHandler for LogArchiver {
    fn name(&self) -> &'static str {
        "log-archiver"
    }

    async fn handle(&self, metric: &Metric, now: DateTime<Utc>) -> Result<()> {
        self.archive(metric, now).await
    }
}
