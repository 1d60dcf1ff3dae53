//! Worker and curator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use workers_core::{Error, Result};

/// Consumption loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerWorkerConfig {
    /// Upper bound on one handler call, in milliseconds
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,
    /// Pause after requeueing a message, in milliseconds
    #[serde(default = "default_requeue_delay_ms")]
    pub requeue_delay_ms: u64,
    /// Pause after a broker failure, in milliseconds
    #[serde(default = "default_source_error_delay_ms")]
    pub source_error_delay_ms: u64,
}

fn default_handler_timeout_ms() -> u64 {
    10_000
}

fn default_requeue_delay_ms() -> u64 {
    500
}

fn default_source_error_delay_ms() -> u64 {
    1_000
}

impl Default for ConsumerWorkerConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: default_handler_timeout_ms(),
            requeue_delay_ms: default_requeue_delay_ms(),
            source_error_delay_ms: default_source_error_delay_ms(),
        }
    }
}

impl ConsumerWorkerConfig {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }

    pub fn source_error_delay(&self) -> Duration {
        Duration::from_millis(self.source_error_delay_ms)
    }
}

/// Which month a scheduled curation tick compacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurationTarget {
    /// The month the tick falls in.
    Current,
    /// The month before the tick. Ticks land on month boundaries, so this
    /// is the month that just closed.
    Previous,
}

/// Monthly curator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorConfig {
    /// Attempts of the aggregate-and-commit step per cycle
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// First backoff between attempts, doubled after each failure, in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Period between ticks after the first month-end tick, in seconds
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    #[serde(default = "default_target")]
    pub target: CurationTarget,
    /// Key of the fleet-wide lock record
    #[serde(default = "default_lock_key")]
    pub lock_key: String,
    /// Expiry of an acquired lock, in seconds. None keeps it until released.
    #[serde(default)]
    pub lock_lease_secs: Option<u64>,
    /// Respawns allowed after curator faults. None means unlimited.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: Option<u32>,
    /// Pause before respawning a faulted curator, in milliseconds
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

fn default_retry_count() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2_000
}

fn default_period_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_target() -> CurationTarget {
    CurationTarget::Current
}

fn default_lock_key() -> String {
    "DIST_LOCK".to_string()
}

fn default_max_restarts() -> Option<u32> {
    Some(10)
}

fn default_restart_delay_ms() -> u64 {
    1_000
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            backoff_base_ms: default_backoff_base_ms(),
            period_secs: default_period_secs(),
            target: default_target(),
            lock_key: default_lock_key(),
            lock_lease_secs: None,
            max_restarts: default_max_restarts(),
            restart_delay_ms: default_restart_delay_ms(),
        }
    }
}

impl CuratorConfig {
    /// Rejects values the tick loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.period_secs == 0 {
            return Err(Error::config("curator.period_secs must be positive"));
        }
        if self.lock_key.is_empty() {
            return Err(Error::config("curator.lock_key must not be empty"));
        }
        if self.lock_lease_secs == Some(0) {
            return Err(Error::config("curator.lock_lease_secs must be positive when set"));
        }
        Ok(())
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn lock_lease(&self) -> Option<Duration> {
        self.lock_lease_secs.map(Duration::from_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}
