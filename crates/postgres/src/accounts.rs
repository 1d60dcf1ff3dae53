//! Account persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use tracing::{debug, instrument};
use workers_core::{Account, Error, NewAccount, Result};

use crate::pool::PgPool;

/// Relational account storage.
///
/// `insert` must report a duplicate name as [`Error::StoreConstraint`] and
/// nothing else, so callers can tell "already exists" from a real failure.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert(&self, account: &NewAccount) -> Result<Account>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Account>>;
}

const INSERT_ACCOUNT: &str =
    "INSERT INTO accounts (name, created_at) VALUES ($1, $2) RETURNING id, name, created_at";

const SELECT_ACCOUNT: &str = "SELECT id, name, created_at FROM accounts WHERE name = $1";

fn map_pg_error(op: &str, e: tokio_postgres::Error) -> Error {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        let constraint = e
            .as_db_error()
            .and_then(|db| db.constraint())
            .unwrap_or("unique");
        Error::constraint(format!("{}: {}", op, constraint))
    } else {
        Error::store(format!("{}: {}", op, e))
    }
}

fn account_from_row(row: &Row) -> Account {
    let created_at: DateTime<Utc> = row.get("created_at");
    Account {
        id: row.get("id"),
        name: row.get("name"),
        created_at,
    }
}

/// Postgres-backed account store.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    #[instrument(skip(self, account), fields(name = %account.name))]
    async fn insert(&self, account: &NewAccount) -> Result<Account> {
        let conn = self.pool.get().await?;
        let params: [&(dyn tokio_postgres::types::ToSql + Sync); 2] =
            [&account.name, &account.created_at];
        let query = conn.query_one(INSERT_ACCOUNT, &params);

        let row = tokio::time::timeout(self.pool.config().statement_timeout(), query)
            .await
            .map_err(|_| Error::timeout("account insert"))?
            .map_err(|e| map_pg_error("account insert", e))?;

        let account = account_from_row(&row);
        debug!(id = account.id, "Inserted account");
        Ok(account)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Account>> {
        let conn = self.pool.get().await?;
        let params: [&(dyn tokio_postgres::types::ToSql + Sync); 1] = [&name];
        let query = conn.query_opt(SELECT_ACCOUNT, &params);

        let row = tokio::time::timeout(self.pool.config().statement_timeout(), query)
            .await
            .map_err(|_| Error::timeout("account lookup"))?
            .map_err(|e| map_pg_error("account lookup", e))?;

        Ok(row.as_ref().map(account_from_row))
    }
}
