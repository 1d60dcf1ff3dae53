//! Durable consumer positions.
//!
//! rskafka has no consumer-group offset commit, so the settled position of
//! each stream is kept in an [`OffsetStore`] and read back on startup.

use async_trait::async_trait;
use workers_core::Result;

/// Persists the next offset to consume, per stream.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    /// Offset saved for `stream`, if any.
    async fn load(&self, stream: &str) -> Result<Option<i64>>;

    /// Saves `offset` as the next offset to consume for `stream`.
    async fn save(&self, stream: &str, offset: i64) -> Result<()>;
}
