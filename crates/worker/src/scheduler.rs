//! Worker scheduler for the process's background tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

use telemetry::{log_snapshot, metrics};

use crate::consumer::ConsumerWorker;
use crate::supervisor::CuratorSupervisor;

/// Worker scheduler configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Metrics snapshot logging interval
    pub metrics_report_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            metrics_report_interval: Duration::from_secs(60),
        }
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    consumer: Option<Arc<ConsumerWorker>>,
    curator: Option<Arc<CuratorSupervisor>>,
}

impl WorkerScheduler {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            consumer: None,
            curator: None,
        }
    }

    /// Adds the consumption loop.
    pub fn with_consumer(mut self, consumer: ConsumerWorker) -> Self {
        self.consumer = Some(Arc::new(consumer));
        self
    }

    /// Adds the supervised monthly curator.
    pub fn with_curator(mut self, curator: CuratorSupervisor) -> Self {
        self.curator = Some(Arc::new(curator));
        self
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        if let Some(ref consumer) = self.consumer {
            let consumer = consumer.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = consumer.run().await {
                    error!("Consumer worker fatal error: {}", e);
                }
            }));
            info!("Consumer worker started");
        }

        if let Some(ref curator) = self.curator {
            let curator = curator.clone();
            handles.push(tokio::spawn(async move {
                let exit = curator.run().await;
                error!(exit = ?exit, "Curator supervisor stopped");
            }));
            info!("Curator supervisor started");
        }

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_report().await;
        }));

        info!("Background workers started");
        handles
    }

    async fn run_metrics_report(&self) {
        let mut ticker = interval(self.config.metrics_report_interval);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            log_snapshot(&metrics().snapshot());
        }
    }
}
