//! Metric log archive.

use crate::client::ClickHouseClient;
use async_trait::async_trait;
use chrono::Utc;
use clickhouse::Row;
use serde::Serialize;
use tracing::debug;
use workers_core::{LogEntry, Result};

/// Append-only storage for archived metrics.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Inserts every metric of `entry` under its bucket. Returns rows written.
    async fn insert_entry(&self, entry: &LogEntry) -> Result<usize>;
}

/// Flattened log row for ClickHouse insertion.
#[derive(Debug, Clone, Row, Serialize)]
pub struct LogRow {
    pub bucket: String,
    pub username: String,
    pub count: i64,
    pub metric: String,
    /// Milliseconds since epoch
    pub archived_at: i64,
}

impl LogRow {
    /// Expands an entry into one row per metric.
    pub fn from_entry(entry: &LogEntry, archived_at: i64) -> Vec<Self> {
        entry
            .metrics
            .iter()
            .map(|m| LogRow {
                bucket: entry.bucket.clone(),
                username: m.username.clone(),
                count: m.count,
                metric: m.metric.clone(),
                archived_at,
            })
            .collect()
    }
}

/// ClickHouse-backed log store.
#[derive(Clone)]
pub struct ClickHouseLogStore {
    client: ClickHouseClient,
}

impl ClickHouseLogStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogStore for ClickHouseLogStore {
    async fn insert_entry(&self, entry: &LogEntry) -> Result<usize> {
        let rows = LogRow::from_entry(entry, Utc::now().timestamp_millis());
        if rows.is_empty() {
            return Ok(0);
        }

        let table = self.client.config().log_table_path();
        let count = rows.len();
        let client = self.client.inner();

        self.client
            .timed("insert logs", async {
                let mut insert = client.insert::<LogRow>(&table)?;
                for row in &rows {
                    insert.write(row).await?;
                }
                insert.end().await
            })
            .await?;

        debug!(bucket = %entry.bucket, rows = count, "Archived log entry");
        Ok(count)
    }
}
