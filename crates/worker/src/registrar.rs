//! Account registration on first-seen username.

use crate::handler::MetricHandler;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postgres_store::AccountStore;
use std::sync::Arc;
use telemetry::metrics;
use tracing::debug;
use workers_core::{Metric, NewAccount, Result};

/// Inserts an account per username and lets the store's unique index on
/// `name` absorb repeats. No read precedes the insert, so concurrent
/// workers cannot race into duplicates.
pub struct AccountRegistrar {
    accounts: Arc<dyn AccountStore>,
}

impl AccountRegistrar {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Creates the account unless one with the same name exists.
    pub async fn register_if_absent(&self, metric: &Metric, now: DateTime<Utc>) -> Result<()> {
        let account = NewAccount::from_metric(metric, now);

        match self.accounts.insert(&account).await {
            Ok(created) => {
                metrics().accounts_created.inc();
                debug!(id = created.id, username = %created.name, "Account created");
                Ok(())
            }
            Err(e) if e.is_constraint() => {
                metrics().accounts_existing.inc();
                debug!(username = %account.name, "Account already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MetricHandler for AccountRegistrar {
    fn name(&self) -> &'static str {
        "account-registrar"
    }

    async fn handle(&self, metric: &Metric, now: DateTime<Utc>) -> Result<()> {
        self.register_if_absent(metric, now).await
    }
}
