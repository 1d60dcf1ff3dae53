//! Connection pool.

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::NoTls;
use tracing::{debug, info};
use workers_core::{Error, Result};

use crate::config::PostgresConfig;

/// Postgres connection pool
#[derive(Clone)]
pub struct PgPool {
    pool: Pool,
    config: PostgresConfig,
}

impl PgPool {
    /// Create a new connection pool. Connections are opened on demand.
    pub fn new(config: PostgresConfig) -> Result<Self> {
        info!(max_size = config.pool_size, "Creating Postgres connection pool");

        let pg_config: tokio_postgres::Config = config
            .url
            .parse()
            .map_err(|e| Error::config(format!("Invalid Postgres URL: {}", e)))?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = Manager::from_config(pg_config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| Error::config(format!("Failed to build pool: {}", e)))?;

        debug!("Postgres pool created");

        Ok(Self { pool, config })
    }

    /// Get a connection from the pool
    pub async fn get(&self) -> Result<Object> {
        match tokio::time::timeout(self.config.statement_timeout(), self.pool.get()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(Error::store(format!("Postgres pool: {}", e))),
            Err(_) => Err(Error::timeout("Postgres pool checkout")),
        }
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    /// Check pool health
    pub async fn is_healthy(&self) -> bool {
        match self.get().await {
            Ok(conn) => conn.simple_query("SELECT 1").await.is_ok(),
            Err(_) => false,
        }
    }
}
