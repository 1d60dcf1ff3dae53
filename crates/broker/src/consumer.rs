//! Kafka-compatible consumer implementing the delivery contract.
//!
//! Uses rskafka with manual position management:
//! - the exchange is the topic every worker role reads in full
//! - records are buffered per fetch and handed out one at a time
//! - `ack` and reject advance the committed position, saved to the offset store
//! - `nack(requeue)` rewinds the fetch position so the record comes back
//! - on startup a saved position wins over `start_from`

use crate::config::{BrokerConfig, StartFrom};
use crate::delivery::{Delivery, DeliverySource};
use crate::offsets::OffsetStore;
use async_trait::async_trait;
use rskafka::client::{
    partition::{OffsetAt, PartitionClient, UnknownTopicHandling},
    ClientBuilder, Credentials, SaslConfig,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use workers_core::{Error, Result};

/// Creates a TLS configuration for managed brokers.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Read position and buffered records of the stream.
#[derive(Debug)]
struct StreamState {
    buffer: VecDeque<Delivery>,
    /// Next offset to fetch; negative until initialized.
    next_fetch: i64,
    /// Highest offset ever handed out, used to flag redeliveries.
    delivered_high: i64,
}

impl StreamState {
    fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            next_fetch: -1,
            delivered_high: -1,
        }
    }

    fn take_next(&mut self) -> Option<Delivery> {
        let mut delivery = self.buffer.pop_front()?;
        delivery.redelivered = delivery.tag <= self.delivered_high;
        self.delivered_high = self.delivered_high.max(delivery.tag);
        Some(delivery)
    }

    fn rewind_to(&mut self, tag: i64) {
        self.buffer.clear();
        self.next_fetch = tag;
    }
}

/// Consumer for one worker queue.
pub struct Consumer {
    config: BrokerConfig,
    partition_client: RwLock<Option<Arc<PartitionClient>>>,
    state: Mutex<StreamState>,
    /// Offset after the last acknowledged or rejected record.
    committed: AtomicI64,
    offsets: Option<Arc<dyn OffsetStore>>,
}

impl Consumer {
    /// Creates a new consumer. The connection is established lazily.
    pub fn new(config: BrokerConfig) -> Self {
        info!(
            exchange = %config.exchange,
            queue = %config.queue,
            partition = config.partition,
            "Creating broker consumer"
        );

        Self {
            config,
            partition_client: RwLock::new(None),
            state: Mutex::new(StreamState::new()),
            committed: AtomicI64::new(-1),
            offsets: None,
        }
    }

    /// Persists settled positions to `offsets` and resumes from them.
    pub fn with_offset_store(mut self, offsets: Arc<dyn OffsetStore>) -> Self {
        self.offsets = Some(offsets);
        self
    }

    /// Key of this stream in the offset store.
    pub fn stream_id(&self) -> String {
        format!("{}:{}:{}", self.config.queue, self.config.exchange, self.config.partition)
    }

    /// Returns the consumer configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Offset after the last settled record, or -1 before the first one.
    pub fn committed_offset(&self) -> i64 {
        self.committed.load(Ordering::SeqCst)
    }

    async fn ensure_connected(&self) -> Result<Arc<PartitionClient>> {
        {
            let client = self.partition_client.read().await;
            if let Some(ref c) = *client {
                return Ok(c.clone());
            }
        }

        let mut builder = ClientBuilder::new(vec![self.config.broker_string()]);

        if let Some((username, password)) = self.config.credentials() {
            builder = builder
                .tls_config(create_tls_config())
                .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                    username.to_string(),
                    password.to_string(),
                )));
        }

        let client = builder
            .build()
            .await
            .map_err(|e| Error::broker(format!("Failed to connect to broker: {}", e)))?;

        let partition_client = client
            .partition_client(
                self.config.exchange.clone(),
                self.config.partition,
                UnknownTopicHandling::Error,
            )
            .await
            .map_err(|e| Error::broker(format!("Failed to get partition client: {}", e)))?;

        let partition_client = Arc::new(partition_client);
        *self.partition_client.write().await = Some(partition_client.clone());

        Ok(partition_client)
    }

    /// Loads the saved position, if an offset store is configured and has one.
    async fn resume_offset(&self) -> Result<Option<i64>> {
        let Some(ref offsets) = self.offsets else {
            return Ok(None);
        };

        let saved = offsets.load(&self.stream_id()).await?;
        if let Some(offset) = saved {
            self.committed.fetch_max(offset, Ordering::SeqCst);
        }
        Ok(saved)
    }

    async fn initial_offset(&self, client: &PartitionClient) -> Result<i64> {
        if let Some(offset) = self.resume_offset().await? {
            info!(
                queue = %self.config.queue,
                offset = offset,
                "Consumer resuming from saved offset"
            );
            return Ok(offset);
        }

        let at = match self.config.start_from {
            StartFrom::Earliest => OffsetAt::Earliest,
            StartFrom::Latest => OffsetAt::Latest,
        };

        let offset = client
            .get_offset(at)
            .await
            .map_err(|e| Error::broker(format!("Failed to get offset: {}", e)))?;

        info!(
            queue = %self.config.queue,
            offset = offset,
            "Consumer initialized at offset"
        );
        Ok(offset)
    }

    /// Fetches the next chunk of records into the buffer.
    async fn fill(&self, state: &mut StreamState) -> Result<()> {
        let client = self.ensure_connected().await?;

        if state.next_fetch < 0 {
            state.next_fetch = self.initial_offset(&client).await?;
        }

        let (records, _high_watermark) = client
            .fetch_records(
                state.next_fetch,
                1..self.config.fetch_max_bytes,
                self.config.fetch_max_wait_ms,
            )
            .await
            .map_err(|e| Error::broker(format!("Failed to fetch records: {}", e)))?;

        let mut skipped = 0;
        for record in records {
            if record.offset < state.next_fetch {
                continue;
            }
            state.next_fetch = record.offset + 1;

            match record.record.value {
                Some(body) => state.buffer.push_back(Delivery::new(record.offset, body)),
                None => skipped += 1,
            }
        }

        if !state.buffer.is_empty() || skipped > 0 {
            debug!(
                buffered = state.buffer.len(),
                skipped = skipped,
                next_fetch = state.next_fetch,
                "Fetched records"
            );
        }

        Ok(())
    }

    async fn settle(&self, tag: i64) {
        let next = tag + 1;
        let previous = self.committed.fetch_max(next, Ordering::SeqCst);
        if next <= previous {
            return;
        }

        if let Some(ref offsets) = self.offsets {
            // A lost save only widens redelivery after a restart.
            if let Err(e) = offsets.save(&self.stream_id(), next).await {
                warn!(
                    queue = %self.config.queue,
                    offset = next,
                    error = %e,
                    kind = e.kind(),
                    "Failed to save consumer offset"
                );
            }
        }
    }
}

#[async_trait]
impl DeliverySource for Consumer {
    async fn next(&self) -> Result<Option<Delivery>> {
        let mut state = self.state.lock().await;
        loop {
            if let Some(delivery) = state.take_next() {
                return Ok(Some(delivery));
            }
            // An empty fetch returns after `fetch_max_wait_ms`; keep waiting.
            self.fill(&mut state).await?;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.settle(delivery.tag).await;
        debug!(tag = delivery.tag, "Acked");
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, requeue: bool) -> Result<()> {
        if requeue {
            self.state.lock().await.rewind_to(delivery.tag);
            debug!(tag = delivery.tag, "Nacked, rewinding for redelivery");
        } else {
            self.settle(delivery.tag).await;
            warn!(tag = delivery.tag, queue = %self.config.queue, "Rejected message");
        }
        Ok(())
    }

    async fn reset(&self) {
        *self.partition_client.write().await = None;
        info!(queue = %self.config.queue, "Consumer connection reset");
    }

    fn name(&self) -> &str {
        &self.config.queue
    }
}
