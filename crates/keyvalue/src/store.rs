//! Store traits.

use async_trait::async_trait;
use std::time::Duration;
use workers_core::Result;

/// Commands the workers issue against the key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Sets `key` with no expiry, overwriting any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Sets `key` only if it does not exist. Returns whether it was written.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Lists keys matching a glob pattern such as `2024-3-*`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Deletes keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Starts watching `key` for an optimistic transaction.
    async fn watch(&self, key: &str) -> Result<Box<dyn WatchedKey>>;
}

/// A key under watch. Any write to it by someone else between `watch` and
/// `commit_set` makes the commit abort.
#[async_trait]
pub trait WatchedKey: Send {
    /// Reads the watched key.
    async fn get(&mut self) -> Result<Option<String>>;

    /// Writes `value` in a transaction. Returns `false` when the transaction
    /// aborted because the key changed concurrently.
    async fn commit_set(self: Box<Self>, value: &str, ttl: Option<Duration>) -> Result<bool>;

    /// Stops watching without writing.
    async fn discard(self: Box<Self>) -> Result<()>;
}
