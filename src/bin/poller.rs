//! sc4snmp-poller: SNMP polling control plane daemon.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use sc4snmp_poller::backend::{start_backend, BackendConfig, OrchestratorTiming};
use sc4snmp_poller::config::load_config;
use sc4snmp_poller::publish::Publisher;
use sc4snmp_poller::store::{StoreConfig, StorePool};
use sc4snmp_poller::translate::TranslatorClient;
use sc4snmp_poller::worker::PollContext;

#[derive(Parser)]
#[command(name = "sc4snmp-poller", about = "SNMP polling control plane daemon")]
struct Cli {
    /// Log level passed to the tracing env-filter.
    #[arg(long, default_value = "info")]
    loglevel: String,

    /// Server config YAML file.
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    /// Inventory CSV file.
    #[arg(long, default_value = "inventory.csv")]
    inventory: PathBuf,

    /// Seconds between forced inventory/config reloads, even without a
    /// detected mtime change.
    #[arg(long, default_value_t = 60)]
    refresh_interval: u64,

    /// Ingest index for event-shaped records.
    #[arg(long, default_value = "events")]
    event_index: String,

    /// Ingest index for metric-shaped records.
    #[arg(long, default_value = "metrics")]
    metric_index: String,

    /// Ingest index for meta/status events.
    #[arg(long, default_value = "meta")]
    meta_index: String,

    /// Seconds between real-time liveness checks.
    #[arg(long, default_value_t = 60)]
    realtime_task_frequency: u64,

    /// Seconds between dynamic profile matching passes.
    #[arg(long, default_value_t = 30)]
    matching_task_frequency: u64,

    /// Minutes between one-time re-walk queue drains.
    #[arg(long, default_value_t = 5)]
    onetime_task_frequency: u64,

    /// Worker pool size, or `AUTO * N` to scale with available cores.
    #[arg(long, default_value = "AUTO * 2")]
    workers: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(cli.loglevel.parse()?))
        .init();

    let poller_config = load_config(&cli.config)?;
    tracing::info!(version = sc4snmp_poller::VERSION, "sc4snmp-poller starting");

    let store_config = StoreConfig {
        host: std::env::var("SC4SNMP_STORE_HOST").unwrap_or_else(|_| "localhost".into()),
        port: std::env::var("SC4SNMP_STORE_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(5432),
        database: poller_config.mongo.database.clone(),
        user: std::env::var("SC4SNMP_STORE_USER").unwrap_or_else(|_| "postgres".into()),
        password: std::env::var("SC4SNMP_STORE_PASSWORD").unwrap_or_default(),
    };
    let store = StorePool::new(&store_config).await?;
    store.ping().await?;
    store.ensure_schema().await?;

    let translator_url = std::env::var("MIBS_SERVER_URL").unwrap_or_else(|_| "http://localhost:8000".into());
    let logs_url = std::env::var("OTEL_SERVER_LOGS_URL").unwrap_or_else(|_| "http://localhost:4318/v1/logs".into());
    let metrics_url = std::env::var("OTEL_SERVER_METRICS_URL").unwrap_or_else(|_| "http://localhost:4318/v1/metrics".into());

    let worker_count = sc4snmp_poller::backend::calculate_workers(&cli.workers);

    let ctx = PollContext {
        config: Arc::new(RwLock::new(poller_config.clone())),
        store: store.clone(),
        translator: Arc::new(TranslatorClient::new(translator_url)),
        publisher: Arc::new(Publisher::new(logs_url, metrics_url)),
        metrics_index: cli.metric_index.clone(),
        event_index: cli.event_index.clone(),
        meta_index: cli.meta_index.clone(),
    };

    let backend_config = BackendConfig {
        inventory_path: cli.inventory,
        config_path: cli.config,
        refresh_interval: Duration::from_secs(cli.refresh_interval),
        worker_count,
        timing: OrchestratorTiming {
            realtime_task_frequency: Duration::from_secs(cli.realtime_task_frequency),
            matching_task_frequency: Duration::from_secs(cli.matching_task_frequency),
            onetime_task_frequency: Duration::from_secs(cli.onetime_task_frequency * 60),
        },
    };

    start_backend(backend_config, poller_config, store, ctx).await
}
