//! Relational account store for the metric workers.

pub mod accounts;
pub mod config;
pub mod pool;
pub mod schema;

pub use accounts::*;
pub use config::*;
pub use pool::*;
