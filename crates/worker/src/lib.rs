//! Background workers for the metric pipeline.
//!
//! - Consumer: decode, handle, ack / requeue / reject
//! - Handlers: account registrar, daily event recorder, log archiver
//! - Offsets: consumer positions saved in the key-value store
//! - Curator: monthly marker rollup under a fleet-wide lock, supervised

pub mod archiver;
pub mod config;
pub mod consumer;
pub mod curator;
pub mod handler;
pub mod lock;
pub mod offsets;
pub mod recorder;
pub mod registrar;
pub mod schedule;
pub mod scheduler;
pub mod supervisor;

pub use archiver::LogArchiver;
pub use config::*;
pub use consumer::*;
pub use curator::*;
pub use handler::MetricHandler;
pub use lock::*;
pub use offsets::KeyValueOffsetStore;
pub use recorder::EventRecorder;
pub use registrar::AccountRegistrar;
pub use scheduler::*;
pub use supervisor::*;
