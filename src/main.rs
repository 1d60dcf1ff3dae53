//! Metric Workers
//!
//! Queue-fed workers, one role per process:
//! - accounts: register an account on a username's first metric
//! - events: record daily event markers and curate them monthly
//! - logs: archive raw metrics into hour buckets

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use broker::{BrokerConfig, Consumer, DeliverySource};
use clickhouse_client::{ClickHouseClient, ClickHouseConfig, ClickHouseLogStore};
use keyvalue::{KeyValueConfig, KeyValueStore, RedisStore};
use postgres_store::{PgAccountStore, PgPool, PostgresConfig};
use telemetry::{health, init_tracing_from_env};
use worker::{
    AccountRegistrar, ConsumerWorker, ConsumerWorkerConfig, Curator, CuratorConfig,
    CuratorSupervisor, DistributedLock, EventRecorder, KeyValueOffsetStore, LogArchiver,
    MetricHandler, WorkerConfig, WorkerScheduler,
};

/// Which handler this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
enum WorkerRole {
    Accounts,
    Events,
    Logs,
}

impl std::str::FromStr for WorkerRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accounts" => Ok(WorkerRole::Accounts),
            "events" => Ok(WorkerRole::Events),
            "logs" => Ok(WorkerRole::Logs),
            other => Err(anyhow!("unknown worker role '{}'", other)),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_role")]
    role: WorkerRole,

    #[serde(default)]
    broker: BrokerConfig,

    #[serde(default)]
    redis: KeyValueConfig,

    #[serde(default)]
    postgres: PostgresConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    consumer: ConsumerWorkerConfig,

    #[serde(default)]
    curator: CuratorConfig,

    #[serde(default = "default_metrics_report_interval_secs")]
    metrics_report_interval_secs: u64,
}

fn default_role() -> WorkerRole {
    WorkerRole::Events
}

fn default_metrics_report_interval_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: default_role(),
            broker: BrokerConfig::default(),
            redis: KeyValueConfig::default(),
            postgres: PostgresConfig::default(),
            clickhouse: ClickHouseConfig::default(),
            consumer: ConsumerWorkerConfig::default(),
            curator: CuratorConfig::default(),
            metrics_report_interval_secs: default_metrics_report_interval_secs(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ needs an explicit crypto provider before any TLS use
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Metric Workers v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    info!(
        role = ?config.role,
        brokers = ?config.broker.brokers,
        exchange = %config.broker.exchange,
        queue = %config.broker.queue,
        "Loaded configuration"
    );

    let broker_healthy = broker::health::check_connection(&config.broker).await;
    if broker_healthy {
        health().broker.set_healthy();
        info!("Broker connection: healthy");
    } else {
        health().broker.set_unhealthy("Connection failed");
        error!("Broker connection: unhealthy");
    }

    // Every role saves its consumer position in Redis; the events role also
    // keeps its markers and lock there.
    let redis = RedisStore::new(config.redis.clone()).context("Failed to create Redis client")?;
    report_store_health(redis.is_healthy().await, "Redis");
    let kv: Arc<dyn KeyValueStore> = Arc::new(redis);

    let source: Arc<dyn DeliverySource> = Arc::new(
        Consumer::new(config.broker.clone())
            .with_offset_store(Arc::new(KeyValueOffsetStore::new(kv.clone()))),
    );

    let (handler, curator): (Arc<dyn MetricHandler>, Option<CuratorSupervisor>) = match config.role
    {
        WorkerRole::Accounts => {
            let pool = PgPool::new(config.postgres.clone())
                .context("Failed to create Postgres pool")?;
            postgres_store::schema::init_schema(&pool)
                .await
                .context("Failed to initialize accounts schema")?;
            report_store_health(pool.is_healthy().await, "Postgres");

            let registrar: Arc<dyn MetricHandler> =
                Arc::new(AccountRegistrar::new(Arc::new(PgAccountStore::new(pool))));
            (registrar, None)
        }
        WorkerRole::Events => {
            let store = kv.clone();

            let lock = DistributedLock::new(
                store.clone(),
                config.curator.lock_key.clone(),
                config.curator.lock_lease(),
            );
            lock.ensure_initialized()
                .await
                .context("Failed to initialize lock record")?;

            let curator = Curator::new(store.clone(), lock, config.curator.clone());
            let recorder: Arc<dyn MetricHandler> = Arc::new(EventRecorder::new(store));
            (recorder, Some(CuratorSupervisor::new(Arc::new(curator))))
        }
        WorkerRole::Logs => {
            let clickhouse = ClickHouseClient::new(config.clickhouse.clone());
            clickhouse_client::health::init_schema(&clickhouse)
                .await
                .context("Failed to initialize ClickHouse schema")?;
            report_store_health(
                clickhouse_client::health::check_connection(&clickhouse).await,
                "ClickHouse",
            );

            let archiver: Arc<dyn MetricHandler> =
                Arc::new(LogArchiver::new(Arc::new(ClickHouseLogStore::new(clickhouse))));
            (archiver, None)
        }
    };

    let report = health().report();
    info!(
        handler = handler.name(),
        status = ?report.status,
        "Handler ready"
    );

    let consumer = ConsumerWorker::with_config(source, handler, config.consumer.clone());
    let mut scheduler = WorkerScheduler::new(WorkerConfig {
        metrics_report_interval: std::time::Duration::from_secs(
            config.metrics_report_interval_secs,
        ),
    })
    .with_consumer(consumer);
    if let Some(curator) = curator {
        scheduler = scheduler.with_curator(curator);
    }

    let handles = Arc::new(scheduler).start();

    shutdown_signal().await;

    info!("Shutting down...");
    for handle in &handles {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from defaults, an optional file, and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("WORKERS")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat overrides for the variables deployments set most often
    if let Ok(role) = std::env::var("WORKERS_ROLE") {
        config.role = role.parse()?;
    }
    if let Ok(brokers) = std::env::var("WORKERS_BROKERS") {
        config.broker.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(queue) = std::env::var("WORKERS_QUEUE") {
        config.broker.queue = queue;
    }
    if let Ok(username) = std::env::var("WORKERS_BROKER_SASL_USERNAME") {
        config.broker.sasl_username = Some(username);
    }
    if let Ok(password) = std::env::var("WORKERS_BROKER_SASL_PASSWORD") {
        config.broker.sasl_password = Some(password);
    }
    if let Ok(url) = std::env::var("WORKERS_REDIS_URL") {
        config.redis.url = url;
    }
    if let Ok(url) = std::env::var("WORKERS_POSTGRES_URL") {
        config.postgres.url = url;
    }
    if let Ok(url) = std::env::var("WORKERS_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.broker.brokers.is_empty() {
        return Err(anyhow!("broker.brokers must list at least one broker"));
    }
    if config.metrics_report_interval_secs == 0 {
        return Err(anyhow!("metrics_report_interval_secs must be positive"));
    }
    if config.consumer.handler_timeout_ms == 0 {
        return Err(anyhow!("consumer.handler_timeout_ms must be positive"));
    }
    config.curator.validate()?;
    Ok(())
}

fn report_store_health(healthy: bool, name: &str) {
    if healthy {
        health().store.set_healthy();
        info!("{} connection: healthy", name);
    } else {
        health().store.set_unhealthy(format!("{} connection failed", name));
        error!("{} connection: unhealthy", name);
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
