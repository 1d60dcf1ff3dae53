//! Account table schema.

use tracing::debug;
use workers_core::{Error, Result};

use crate::pool::PgPool;

/// Accounts are unique by name; the id is a surrogate key.
pub const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

/// Create the accounts table if missing.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    let conn = pool.get().await?;
    conn.batch_execute(CREATE_ACCOUNTS_TABLE)
        .await
        .map_err(|e| Error::store(format!("Failed to create accounts table: {}", e)))?;

    debug!("Postgres schema initialized");
    Ok(())
}
