//! Unified error types for the metric workers.
//!
//! The taxonomy mirrors how failures are handled downstream:
//! - `Decode`: malformed message body, the delivery is rejected
//! - `StoreTransient` / `Timeout`: retryable, the delivery is requeued
//! - `StoreConstraint`: uniqueness violation, an expected outcome for registration
//! - `Broker`, `Config`, `Internal`: infrastructure failures

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the metric workers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("store error: {0}")]
    StoreTransient(String),

    #[error("constraint violation: {0}")]
    StoreConstraint(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreTransient(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::StoreConstraint(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn broker(msg: impl Into<String>) -> Self {
        Self::Broker(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a later attempt of the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreTransient(_) | Self::Timeout(_) | Self::Broker(_)
        )
    }

    /// Whether this is a uniqueness violation reported by a store.
    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::StoreConstraint(_))
    }

    /// Short machine-friendly label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::StoreTransient(_) => "store_transient",
            Self::StoreConstraint(_) => "store_constraint",
            Self::Timeout(_) => "timeout",
            Self::Broker(_) => "broker",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}
