//! ClickHouse health checks and bootstrap.

use crate::client::ClickHouseClient;
use crate::schema::{create_database, create_log_table};
use tracing::{debug, error};
use workers_core::Result;

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.inner().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            false
        }
    }
}

/// Create the database and the log table if missing.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    let config = client.config();

    // The configured database may not exist yet, so create it from `default`.
    let bootstrap = client.inner().clone().with_database("default");
    let create_db = create_database(&config.database);
    client
        .timed("create database", bootstrap.query(&create_db).execute())
        .await?;

    let create_table = create_log_table(&config.log_table_path());
    client
        .timed("create table", client.inner().query(&create_table).execute())
        .await?;

    debug!(table = %config.log_table_path(), "ClickHouse schema initialized");
    Ok(())
}
