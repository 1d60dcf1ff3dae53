//! Monthly curation of daily event markers.
//!
//! A cycle takes the fleet lock, folds every well-formed marker of the
//! target month into one aggregate record, deletes every listed marker, and
//! releases the lock. The fold-and-commit step is retried with doubling
//! backoff; a cycle that exhausts its attempts is abandoned with the lock
//! released so a later tick can try again.

use crate::config::CuratorConfig;
use crate::lock::DistributedLock;
use crate::schedule::{backoff_for, target_month, until_month_end};
use chrono::Utc;
use keyvalue::KeyValueStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use workers_core::{parse_marker, MarkerKey, MonthlyAggregate, Result, YearMonth};

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The lock was held elsewhere. Nothing was read or written.
    Skipped,
    /// No well-formed markers existed for the month.
    Empty,
    /// The aggregate was written and every listed marker deleted.
    /// `markers` counts deleted keys, malformed ones included.
    Curated { markers: usize, events: Vec<String> },
    /// Every attempt failed; `error` is the last failure.
    Abandoned { error: String },
}

/// Result of one curation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub month: YearMonth,
    pub outcome: CycleOutcome,
    /// Fold-and-commit attempts made. Zero when skipped.
    pub attempts: u32,
    /// Backoffs slept between attempts, in order.
    pub backoffs: Vec<Duration>,
}

impl CycleReport {
    fn skipped(month: YearMonth) -> Self {
        Self {
            month,
            outcome: CycleOutcome::Skipped,
            attempts: 0,
            backoffs: Vec::new(),
        }
    }
}

/// What one successful fold-and-commit attempt did.
enum Aggregation {
    Empty,
    Committed { markers: usize, events: Vec<String> },
}

/// Rolls daily markers up into monthly aggregates.
pub struct Curator {
    /// Identifies this process's curator in fleet-wide logs.
    instance: Uuid,
    store: Arc<dyn KeyValueStore>,
    lock: DistributedLock,
    config: CuratorConfig,
}

impl Curator {
    pub fn new(store: Arc<dyn KeyValueStore>, lock: DistributedLock, config: CuratorConfig) -> Self {
        Self {
            instance: Uuid::new_v4(),
            store,
            lock,
            config,
        }
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn lock(&self) -> &DistributedLock {
        &self.lock
    }

    pub fn config(&self) -> &CuratorConfig {
        &self.config
    }

    /// Tick loop: first tick at the end of the current month, then every
    /// configured period. Only returns on a fault.
    pub async fn run(&self) -> Result<()> {
        let first = until_month_end(Utc::now());
        info!(
            instance = %self.instance,
            first_tick_secs = first.as_secs(),
            period_secs = self.config.period_secs,
            target = ?self.config.target,
            "Curator scheduled"
        );

        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + first, self.config.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let month = target_month(Utc::now(), self.config.target);
            self.run_cycle(month).await?;
        }
    }

    /// Runs one full cycle for `month`.
    ///
    /// Fold-and-commit failures end up in the report. An `Err` means the
    /// lock itself could not be taken or released.
    pub async fn run_cycle(&self, month: YearMonth) -> Result<CycleReport> {
        metrics().curation_cycles.inc();

        if !self.lock.try_acquire().await? {
            metrics().curation_skipped.inc();
            info!(instance = %self.instance, month = %month, "Curation skipped, lock held elsewhere");
            return Ok(CycleReport::skipped(month));
        }

        let start = Instant::now();
        let report = self.curate_with_retry(month).await;
        self.lock.release().await?;
        metrics()
            .curation_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match &report.outcome {
            CycleOutcome::Skipped => {}
            CycleOutcome::Empty => {
                metrics().curation_empty.inc();
                info!(month = %month, "No markers to curate");
            }
            CycleOutcome::Curated { markers, .. } => {
                metrics().curation_completed.inc();
                metrics().markers_curated.inc_by(*markers as u64);
                info!(
                    instance = %self.instance,
                    month = %month,
                    markers = markers,
                    attempts = report.attempts,
                    "Curation completed"
                );
            }
            CycleOutcome::Abandoned { error } => {
                metrics().curation_abandoned.inc();
                error!(
                    instance = %self.instance,
                    month = %month,
                    attempts = report.attempts,
                    error = %error,
                    "Curation abandoned"
                );
            }
        }

        Ok(report)
    }

    async fn curate_with_retry(&self, month: YearMonth) -> CycleReport {
        let max_attempts = self.config.retry_count.max(1);
        let mut backoffs = Vec::new();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.aggregate_once(month).await {
                Ok(aggregation) => {
                    let outcome = match aggregation {
                        Aggregation::Empty => CycleOutcome::Empty,
                        Aggregation::Committed { markers, events } => {
                            CycleOutcome::Curated { markers, events }
                        }
                    };
                    return CycleReport {
                        month,
                        outcome,
                        attempts: attempt,
                        backoffs,
                    };
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt == max_attempts {
                        break;
                    }

                    let backoff = backoff_for(self.config.backoff_base(), attempt);
                    metrics().curation_retries.inc();
                    warn!(
                        month = %month,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Curation attempt failed, backing off"
                    );
                    backoffs.push(backoff);
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        CycleReport {
            month,
            outcome: CycleOutcome::Abandoned { error: last_error },
            attempts: max_attempts,
            backoffs,
        }
    }

    /// One fold-and-commit attempt. Markers are re-listed on every call.
    ///
    /// Every listed key is deleted once the aggregate is written. Only the
    /// well-formed ones contribute events.
    async fn aggregate_once(&self, month: YearMonth) -> Result<Aggregation> {
        let keys = self.store.keys(&month.marker_pattern()).await?;
        if keys.is_empty() {
            return Ok(Aggregation::Empty);
        }

        let mut markers: Vec<MarkerKey<'_>> = keys
            .iter()
            .filter_map(|key| {
                let parsed = parse_marker(key);
                if parsed.is_none() {
                    debug!(key = %key, "Skipping malformed marker key");
                }
                parsed
            })
            .collect();
        markers.sort_by(|a, b| (a.day, a.event).cmp(&(b.day, b.event)));

        let aggregate = MonthlyAggregate {
            events: markers.iter().map(|m| m.event.to_string()).collect(),
        };
        let payload = serde_json::to_string(&aggregate)?;
        let aggregate_key = month.aggregate_key();
        self.store.set(&aggregate_key, &payload).await?;

        let deleted = self.store.delete(&keys).await?;
        debug!(
            key = %aggregate_key,
            events = aggregate.events.len(),
            malformed = keys.len() - markers.len(),
            deleted = deleted,
            "Aggregate written, markers deleted"
        );

        Ok(Aggregation::Committed {
            markers: keys.len(),
            events: aggregate.events,
        })
    }
}
