//! Fleet-wide curator lock over a single key-value record.
//!
//! Acquisition is optimistic and single-round: WATCH the record, read it,
//! and if it is released write `ACQUIRED` inside MULTI/EXEC. A concurrent
//! write to the record aborts the EXEC, and the loser reports `false`
//! instead of retrying, so at most one racer wins.

use keyvalue::KeyValueStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use workers_core::Result;

/// Stored value of a released lock.
pub const RELEASED: &str = "0";

/// Stored value of an acquired lock.
pub const ACQUIRED: &str = "1";

/// State of the lock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Released,
    Acquired,
}

impl LockState {
    /// Interprets a stored value. A missing record counts as released.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(ACQUIRED) => LockState::Acquired,
            _ => LockState::Released,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Released => RELEASED,
            LockState::Acquired => ACQUIRED,
        }
    }
}

/// Handle on the shared lock record.
///
/// Clones share the `held` flag, so a supervisor holding a clone can tell
/// whether a faulted curator left the lock acquired.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
    key: String,
    lease: Option<Duration>,
    held: Arc<AtomicBool>,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, lease: Option<Duration>) -> Self {
        Self {
            store,
            key: key.into(),
            lease,
            held: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Creates the record as released unless it already exists.
    pub async fn ensure_initialized(&self) -> Result<bool> {
        let created = self.store.set_if_absent(&self.key, RELEASED).await?;
        if created {
            info!(key = %self.key, "Lock record initialized");
        }
        Ok(created)
    }

    /// Attempts to take the lock once. `false` means another holder is
    /// active or a concurrent writer won the race.
    pub async fn try_acquire(&self) -> Result<bool> {
        let mut watched = self.store.watch(&self.key).await?;
        let current = watched.get().await?;

        if LockState::from_value(current.as_deref()) == LockState::Acquired {
            watched.discard().await?;
            debug!(key = %self.key, "Lock already held elsewhere");
            return Ok(false);
        }

        let committed = watched.commit_set(ACQUIRED, self.lease).await?;
        if committed {
            self.held.store(true, Ordering::SeqCst);
            debug!(key = %self.key, lease_secs = ?self.lease.map(|l| l.as_secs()), "Lock acquired");
        } else {
            debug!(key = %self.key, "Lock contended, transaction aborted");
        }
        Ok(committed)
    }

    /// Sets the record to released. Idempotent.
    pub async fn release(&self) -> Result<()> {
        self.store.set(&self.key, RELEASED).await?;
        self.held.store(false, Ordering::SeqCst);
        debug!(key = %self.key, "Lock released");
        Ok(())
    }

    /// Releases only if this handle acquired the lock. Returns whether a
    /// release was issued.
    pub async fn release_if_held(&self) -> Result<bool> {
        if !self.is_held() {
            return Ok(false);
        }
        self.release().await?;
        Ok(true)
    }

    /// Whether this handle currently believes it holds the lock.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}
