//! ClickHouse log archive for the metric workers.

pub mod client;
pub mod config;
pub mod health;
pub mod logs;
pub mod schema;

pub use client::*;
pub use config::*;
pub use logs::*;
