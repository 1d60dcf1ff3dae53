//! Restart loop owning the curator's lifecycle.
//!
//! The curator runs in its own task. When that task panics or returns an
//! error the supervisor logs the fault, releases the lock if the faulted
//! curator still held it, and respawns after a delay until the restart
//! budget runs out.

use crate::curator::Curator;
use std::any::Any;
use std::sync::Arc;
use telemetry::metrics;
use tracing::{error, info, warn};

/// Why the supervisor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorExit {
    /// The curator loop returned without a fault.
    Finished,
    /// The curator task was cancelled from outside.
    Cancelled,
    /// The curator faulted more often than the restart budget allows.
    BudgetExhausted { restarts: u32 },
}

pub struct CuratorSupervisor {
    curator: Arc<Curator>,
}

impl CuratorSupervisor {
    pub fn new(curator: Arc<Curator>) -> Self {
        Self { curator }
    }

    /// Runs and respawns the curator loop.
    pub async fn run(&self) -> SupervisorExit {
        let max_restarts = self.curator.config().max_restarts;
        let restart_delay = self.curator.config().restart_delay();
        let mut restarts: u32 = 0;

        loop {
            let curator = self.curator.clone();
            let handle = tokio::spawn(async move { curator.run().await });

            let fault = match handle.await {
                Ok(Ok(())) => {
                    info!("Curator loop finished");
                    return SupervisorExit::Finished;
                }
                Ok(Err(e)) => e.to_string(),
                Err(join_error) if join_error.is_panic() => {
                    format!("panic: {}", panic_message(join_error.into_panic()))
                }
                Err(_) => {
                    info!("Curator task cancelled");
                    return SupervisorExit::Cancelled;
                }
            };

            error!(fault = %fault, restarts = restarts, "Curator faulted");
            self.release_orphaned_lock().await;

            if max_restarts.is_some_and(|max| restarts >= max) {
                error!(restarts = restarts, "Curator restart budget exhausted");
                return SupervisorExit::BudgetExhausted { restarts };
            }

            restarts += 1;
            metrics().curator_restarts.inc();
            tokio::time::sleep(restart_delay).await;
            warn!(restart = restarts, "Respawning curator");
        }
    }

    async fn release_orphaned_lock(&self) {
        let lock = self.curator.lock();
        match lock.release_if_held().await {
            Ok(true) => warn!(key = %lock.key(), "Released lock held by faulted curator"),
            Ok(false) => {}
            Err(e) => error!(key = %lock.key(), error = %e, "Failed to release lock after fault"),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
