//! Core types, key formats, and errors for the metric workers.

pub mod error;
pub mod keys;
pub mod metric;
pub mod models;

pub use error::{Error, Result};
pub use keys::*;
pub use metric::*;
pub use models::*;
