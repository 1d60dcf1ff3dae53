//! Broker consumer adapter for the metric workers.
//!
//! Workers only see the [`DeliverySource`] contract: a stream of raw
//! message bodies with explicit ack / nack. [`Consumer`] implements it on a
//! Kafka-compatible log with rskafka, persisting its settled position through
//! an [`OffsetStore`].

pub mod config;
pub mod consumer;
pub mod delivery;
pub mod health;
pub mod offsets;

pub use config::*;
pub use consumer::*;
pub use delivery::*;
pub use offsets::OffsetStore;
