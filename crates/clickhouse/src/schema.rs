//! ClickHouse table schemas.
//!
//! One row per archived metric, keyed by its hour bucket. Rows are never
//! updated; a bucket's log is every row sharing the same `bucket`.

/// DDL for the metric log table.
pub fn create_log_table(table_path: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {} (
    bucket LowCardinality(String),
    username String,
    count Int64,
    metric LowCardinality(String),
    archived_at DateTime64(3)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(archived_at)
ORDER BY (bucket, archived_at)
"#,
        table_path
    )
}

/// DDL for the database holding the log table.
pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}
