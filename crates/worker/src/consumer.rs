//! Consumer worker driving one delivery stream through one handler.
//!
//! Every delivery ends in exactly one settlement:
//! 1. Decode the body; malformed bodies are rejected, never acked
//! 2. Run the handler under a timeout
//! 3. Ack on success, requeue on any handler failure (at-least-once)

use crate::config::ConsumerWorkerConfig;
use crate::handler::MetricHandler;
use broker::{Delivery, DeliverySource};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, error, info, warn};
use workers_core::{body_preview, decode_metric, Result};

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acked,
    Requeued,
    Rejected,
}

/// Worker that consumes metrics and hands them to a [`MetricHandler`].
pub struct ConsumerWorker {
    source: Arc<dyn DeliverySource>,
    handler: Arc<dyn MetricHandler>,
    config: ConsumerWorkerConfig,
}

impl ConsumerWorker {
    pub fn new(source: Arc<dyn DeliverySource>, handler: Arc<dyn MetricHandler>) -> Self {
        Self::with_config(source, handler, ConsumerWorkerConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn DeliverySource>,
        handler: Arc<dyn MetricHandler>,
        config: ConsumerWorkerConfig,
    ) -> Self {
        Self {
            source,
            handler,
            config,
        }
    }

    /// Main run loop. Returns once the source reports the stream closed.
    pub async fn run(&self) -> Result<()> {
        info!(
            source = %self.source.name(),
            handler = self.handler.name(),
            handler_timeout_ms = self.config.handler_timeout_ms,
            "Consumer worker starting"
        );

        loop {
            let delivery = match self.source.next().await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    info!(source = %self.source.name(), "Delivery stream closed");
                    return Ok(());
                }
                Err(e) => {
                    metrics().source_errors.inc();
                    error!(source = %self.source.name(), kind = e.kind(), error = %e, "Failed to fetch delivery");
                    tokio::time::sleep(self.config.source_error_delay()).await;
                    self.source.reset().await;
                    continue;
                }
            };

            if let Err(e) = self.process_delivery(&delivery).await {
                metrics().source_errors.inc();
                error!(tag = delivery.tag, error = %e, "Failed to settle delivery");
                tokio::time::sleep(self.config.source_error_delay()).await;
                self.source.reset().await;
            }
        }
    }

    /// Decodes, handles and settles one delivery.
    ///
    /// An `Err` means settlement itself failed; handler failures are folded
    /// into [`Disposition::Requeued`].
    pub async fn process_delivery(&self, delivery: &Delivery) -> Result<Disposition> {
        metrics().messages_received.inc();

        let metric = match decode_metric(&delivery.body) {
            Ok(metric) => metric,
            Err(e) => {
                metrics().decode_errors.inc();
                error!(
                    tag = delivery.tag,
                    error = %e,
                    body = %body_preview(&delivery.body),
                    "Rejecting undecodable message"
                );
                self.source.nack(delivery, false).await?;
                metrics().messages_rejected.inc();
                return Ok(Disposition::Rejected);
            }
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(
            self.config.handler_timeout(),
            self.handler.handle(&metric, Utc::now()),
        )
        .await;
        metrics()
            .handler_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match outcome {
            Ok(Ok(())) => {
                self.source.ack(delivery).await?;
                metrics().messages_acked.inc();
                debug!(
                    tag = delivery.tag,
                    handler = self.handler.name(),
                    username = %metric.username,
                    metric = %metric.metric,
                    "Delivery acked"
                );
                Ok(Disposition::Acked)
            }
            Ok(Err(e)) => {
                if e.is_retryable() {
                    warn!(tag = delivery.tag, handler = self.handler.name(), kind = e.kind(), error = %e, "Handler failed, requeueing");
                } else {
                    error!(tag = delivery.tag, handler = self.handler.name(), kind = e.kind(), error = %e, "Handler failed, requeueing");
                }
                self.requeue(delivery).await
            }
            Err(_) => {
                metrics().handler_timeouts.inc();
                warn!(
                    tag = delivery.tag,
                    handler = self.handler.name(),
                    timeout_ms = self.config.handler_timeout_ms,
                    "Handler timed out, requeueing"
                );
                self.requeue(delivery).await
            }
        }
    }

    async fn requeue(&self, delivery: &Delivery) -> Result<Disposition> {
        self.source.nack(delivery, true).await?;
        metrics().messages_requeued.inc();
        tokio::time::sleep(self.config.requeue_delay()).await;
        Ok(Disposition::Requeued)
    }
}
