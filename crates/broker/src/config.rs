//! Broker configuration.

use serde::{Deserialize, Serialize};

/// Where a fresh consumer starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartFrom {
    Earliest,
    Latest,
}

/// Broker consumer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker addresses
    pub brokers: Vec<String>,
    /// Exchange every metric is published to (the topic name)
    #[serde(default = "default_exchange")]
    pub exchange: String,
    /// Name of this worker's queue, used to label its consumer stream
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Partition to consume
    #[serde(default)]
    pub partition: i32,
    /// Where to start when no position is known
    #[serde(default = "default_start_from")]
    pub start_from: StartFrom,
    /// Maximum bytes per fetch
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: i32,
    /// Maximum time the broker may hold a fetch open, in milliseconds
    #[serde(default = "default_fetch_max_wait_ms")]
    pub fetch_max_wait_ms: i32,
    /// SASL username (enables TLS + SCRAM when set with a password)
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password
    #[serde(default)]
    pub sasl_password: Option<String>,
}

fn default_exchange() -> String {
    "metrics".to_string()
}

fn default_queue() -> String {
    "nameq".to_string()
}

fn default_start_from() -> StartFrom {
    StartFrom::Latest
}

fn default_fetch_max_bytes() -> i32 {
    1024 * 1024
}

fn default_fetch_max_wait_ms() -> i32 {
    1000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            exchange: default_exchange(),
            queue: default_queue(),
            partition: 0,
            start_from: default_start_from(),
            fetch_max_bytes: default_fetch_max_bytes(),
            fetch_max_wait_ms: default_fetch_max_wait_ms(),
            sasl_username: None,
            sasl_password: None,
        }
    }
}

impl BrokerConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// Credentials, if both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.sasl_username, &self.sasl_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}
