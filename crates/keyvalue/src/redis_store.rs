//! Redis implementation of the key-value store.

use crate::config::KeyValueConfig;
use crate::store::{KeyValueStore, WatchedKey};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, RedisResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use workers_core::{Error, Result};

fn map_redis_error(op: &str, e: RedisError) -> Error {
    if e.is_timeout() {
        Error::timeout(format!("redis {}: {}", op, e))
    } else {
        Error::store(format!("redis {}: {}", op, e))
    }
}

async fn timed<T, F>(timeout: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(map_redis_error(op, e)),
        Err(_) => Err(Error::timeout(format!("redis {} after {:?}", op, timeout))),
    }
}

/// Redis-backed store with a cached multiplexed connection.
pub struct RedisStore {
    client: redis::Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    config: KeyValueConfig,
}

impl RedisStore {
    /// Creates a new store. The connection is established lazily.
    pub fn new(config: KeyValueConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| Error::config(format!("Invalid redis URL: {}", e)))?;

        info!(
            timeout_ms = config.command_timeout_ms,
            "Created Redis store"
        );

        Ok(Self {
            client,
            connection: RwLock::new(None),
            config,
        })
    }

    pub fn config(&self) -> &KeyValueConfig {
        &self.config
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        {
            let cached = self.connection.read().await;
            if let Some(ref conn) = *cached {
                return Ok(conn.clone());
            }
        }

        let conn = self.open_connection().await?;
        *self.connection.write().await = Some(conn.clone());
        debug!("Opened Redis connection");
        Ok(conn)
    }

    async fn open_connection(&self) -> Result<MultiplexedConnection> {
        timed(
            self.config.command_timeout(),
            "CONNECT",
            self.client.get_multiplexed_async_connection(),
        )
        .await
    }

    /// Runs a command on the shared connection, dropping the connection
    /// after a failure so the next call reconnects.
    async fn run<T, F, Fut>(&self, op: &str, f: F) -> Result<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.connection().await?;
        let result = timed(self.config.command_timeout(), op, f(conn)).await;
        if let Err(ref e) = result {
            if e.is_retryable() {
                warn!(op = op, error = %e, "Redis command failed, resetting connection");
                *self.connection.write().await = None;
            }
        }
        result
    }

    /// Check the connection with a PING.
    pub async fn is_healthy(&self) -> bool {
        self.run("PING", |mut conn| async move {
            redis::cmd("PING").query_async::<_, String>(&mut conn).await
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run("GET", |mut conn| async move { conn.get(key).await })
            .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.run("SET", |mut conn| async move { conn.set(key, value).await })
            .await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.run("SETNX", |mut conn| async move { conn.set_nx(key, value).await })
            .await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.run("KEYS", |mut conn| async move { conn.keys(pattern).await })
            .await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run("DEL", |mut conn| async move { conn.del(keys).await })
            .await
    }

    async fn watch(&self, key: &str) -> Result<Box<dyn WatchedKey>> {
        // WATCH state is per connection, so every watch gets its own.
        let mut conn = self.open_connection().await?;
        let timeout = self.config.command_timeout();

        timed(
            timeout,
            "WATCH",
            redis::cmd("WATCH").arg(key).query_async::<_, ()>(&mut conn),
        )
        .await?;

        Ok(Box::new(RedisWatch {
            conn,
            key: key.to_string(),
            timeout,
        }))
    }
}

/// A key watched on a dedicated connection.
struct RedisWatch {
    conn: MultiplexedConnection,
    key: String,
    timeout: Duration,
}

#[async_trait]
impl WatchedKey for RedisWatch {
    async fn get(&mut self) -> Result<Option<String>> {
        let key = self.key.clone();
        timed(self.timeout, "GET", self.conn.get(key)).await
    }

    async fn commit_set(self: Box<Self>, value: &str, ttl: Option<Duration>) -> Result<bool> {
        let mut this = self;
        let mut pipe = redis::pipe();
        pipe.atomic();
        match ttl {
            Some(ttl) => {
                pipe.cmd("SET")
                    .arg(&this.key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl.as_millis() as u64)
                    .ignore();
            }
            None => {
                pipe.set(&this.key, value).ignore();
            }
        }

        // EXEC replies nil when a watched key changed.
        let committed: Option<()> =
            timed(this.timeout, "EXEC", pipe.query_async(&mut this.conn)).await?;
        Ok(committed.is_some())
    }

    async fn discard(self: Box<Self>) -> Result<()> {
        let mut this = self;
        timed(
            this.timeout,
            "UNWATCH",
            redis::cmd("UNWATCH").query_async::<_, ()>(&mut this.conn),
        )
        .await
    }
}
