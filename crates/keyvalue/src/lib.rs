//! Key-value store for the metric workers.
//!
//! [`KeyValueStore`] is the narrow command surface the recorder, the curator
//! and the distributed lock need. [`RedisStore`] implements it on Redis.

pub mod config;
pub mod redis_store;
pub mod store;

pub use config::*;
pub use redis_store::*;
pub use store::*;
