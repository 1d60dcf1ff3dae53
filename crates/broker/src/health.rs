//! Broker health checks.

use crate::config::BrokerConfig;
use rskafka::client::ClientBuilder;
use tracing::{debug, error};

/// Check the broker connection and that the exchange topic exists.
pub async fn check_connection(config: &BrokerConfig) -> bool {
    let client = match ClientBuilder::new(vec![config.broker_string()]).build().await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to broker: {}", e);
            return false;
        }
    };

    match client.list_topics().await {
        Ok(topics) => {
            let found = topics.iter().any(|t| t.name == config.exchange);
            if found {
                debug!(topics = topics.len(), exchange = %config.exchange, "Broker connection healthy");
            } else {
                error!(exchange = %config.exchange, "Exchange topic not found on broker");
            }
            found
        }
        Err(e) => {
            error!("Failed to list broker topics: {}", e);
            false
        }
    }
}
