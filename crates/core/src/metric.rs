//! The metric envelope carried on every queue message.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single metric event as published by the ingestion front-end.
///
/// Wire form: `{"username": string, "count": integer, "metric": string}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub username: String,
    pub count: i64,
    /// Event name, e.g. `login`.
    pub metric: String,
}

impl Metric {
    pub fn new(username: impl Into<String>, count: i64, metric: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            count,
            metric: metric.into(),
        }
    }
}

/// Decodes a raw message body into a [`Metric`].
pub fn decode_metric(body: &[u8]) -> Result<Metric> {
    serde_json::from_slice::<Metric>(body).map_err(|e| Error::decode(e.to_string()))
}

/// Lossy, bounded preview of a message body for log lines.
pub fn body_preview(body: &[u8]) -> String {
    const MAX: usize = 256;
    let text = String::from_utf8_lossy(&body[..body.len().min(MAX)]);
    if body.len() > MAX {
        format!("{}...", text)
    } else {
        text.into_owned()
    }
}
