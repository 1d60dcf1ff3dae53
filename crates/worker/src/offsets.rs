//! Consumer positions kept in the key-value store.

use async_trait::async_trait;
use broker::OffsetStore;
use keyvalue::KeyValueStore;
use std::sync::Arc;
use workers_core::{consumer_offset_key, Error, Result};

/// [`OffsetStore`] over the worker's key-value store, one key per stream.
pub struct KeyValueOffsetStore {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueOffsetStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OffsetStore for KeyValueOffsetStore {
    async fn load(&self, stream: &str) -> Result<Option<i64>> {
        let key = consumer_offset_key(stream);
        match self.store.get(&key).await? {
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|e| Error::internal(format!("corrupt offset under {}: {}", key, e))),
            None => Ok(None),
        }
    }

    async fn save(&self, stream: &str, offset: i64) -> Result<()> {
        self.store
            .set(&consumer_offset_key(stream), &offset.to_string())
            .await
    }
}
