//! The consumption contract shared by every worker.

use async_trait::async_trait;
use workers_core::Result;

/// One message handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned identifier used to ack or nack this message.
    pub tag: i64,
    /// Raw message body.
    pub body: Vec<u8>,
    /// Whether this message was handed out before.
    pub redelivered: bool,
}

impl Delivery {
    pub fn new(tag: i64, body: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            body: body.into(),
            redelivered: false,
        }
    }
}

/// An acknowledged message stream.
///
/// Nothing is acknowledged implicitly: every delivery returned by `next`
/// must be settled with exactly one of `ack` or `nack`.
#[async_trait]
pub trait DeliverySource: Send + Sync {
    /// Waits for the next delivery. `None` means the stream has closed.
    async fn next(&self) -> Result<Option<Delivery>>;

    /// Marks a delivery as processed.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Negative acknowledgement. With `requeue` the message is delivered
    /// again; without it the message is rejected and never redelivered.
    async fn nack(&self, delivery: &Delivery, requeue: bool) -> Result<()>;

    /// Drops any cached connection state after a failure.
    async fn reset(&self) {}

    /// Label of this stream for logs.
    fn name(&self) -> &str;
}
