//! Records written by the workers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metric::Metric;

/// A user account, created lazily on the first metric from a username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Surrogate key assigned by the store.
    pub id: i64,
    /// Unique account name.
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An account about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl NewAccount {
    pub fn from_metric(metric: &Metric, now: DateTime<Utc>) -> Self {
        Self {
            name: metric.username.clone(),
            created_at: now,
        }
    }
}

/// Rolled-up event names of one month, one entry per curated marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MonthlyAggregate {
    pub events: Vec<String>,
}

/// Metrics archived under one hour bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub bucket: String,
    pub metrics: Vec<Metric>,
}

impl LogEntry {
    pub fn single(bucket: impl Into<String>, metric: Metric) -> Self {
        Self {
            bucket: bucket.into(),
            metrics: vec![metric],
        }
    }
}
