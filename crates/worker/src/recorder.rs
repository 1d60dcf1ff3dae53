//! Daily event presence markers.

use crate::handler::MetricHandler;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyvalue::KeyValueStore;
use std::sync::Arc;
use telemetry::metrics;
use tracing::debug;
use workers_core::{marker_key, Metric, Result, MARKER_PRESENT};

/// Marks "event X happened on day D". Repeats overwrite the same key.
pub struct EventRecorder {
    store: Arc<dyn KeyValueStore>,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Sets the marker for `now`'s UTC date and the metric's event name.
    pub async fn record_presence(&self, metric: &Metric, now: DateTime<Utc>) -> Result<()> {
        let key = marker_key(now.date_naive(), &metric.metric);
        self.store.set(&key, MARKER_PRESENT).await?;

        metrics().markers_recorded.inc();
        debug!(key = %key, username = %metric.username, "Marker recorded");
        Ok(())
    }
}

#[async_trait]
impl MetricHandler for EventRecorder {
    fn name(&self) -> &'static str {
        "event-recorder"
    }

    async fn handle(&self, metric: &Metric, now: DateTime<Utc>) -> Result<()> {
        self.record_presence(metric, now).await
    }
}
