use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trend_monitor::clock::SystemClock;
use trend_monitor::config::{default_sources, load_additional_sources};
use trend_monitor::http_client::HttpClient;
use trend_monitor::metrics::{MetricsCollector, MetricsConfig};
use trend_monitor::model::Trend;
use trend_monitor::monitor::{MonitorConfig, TrendMonitor};
use trend_monitor::sources::build_source;
use trend_monitor::storage::{SnapshotStore, StorageConfig};

#[derive(Parser)]
#[command(name = "trend-monitor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Polls RSS/Atom feeds and video pages and ranks trending keywords")]
#[command(long_about = None)]
struct Cli {
    /// Poll interval in seconds
    #[arg(long, default_value_t = 900)]
    interval: u64,

    /// Sliding-window size in hours
    #[arg(long, default_value_t = 12.0)]
    retention: f64,

    /// Exponential decay constant in hours
    #[arg(long, default_value_t = 6.0)]
    decay: f64,

    /// Minimum score for a trend to be reported
    #[arg(long = "min-score", default_value_t = 0.4)]
    min_score: f64,

    /// Maximum number of trends reported per iteration
    #[arg(long = "top", default_value_t = 20)]
    top: usize,

    /// SQLite file path
    #[arg(long, default_value = "data/trends.sqlite")]
    storage: String,

    /// Per-source fetch attempts
    #[arg(long = "fetch-retries", default_value_t = 3)]
    fetch_retries: u32,

    /// Base backoff seconds between retries
    #[arg(long = "fetch-backoff", default_value_t = 2.0)]
    fetch_backoff: f64,

    /// Maximum number of sources fetched concurrently
    #[arg(long = "fetch-concurrency", default_value_t = 5)]
    fetch_concurrency: usize,

    /// Dedup TTL in minutes; defaults to `--retention` converted to minutes
    #[arg(long = "dedup-ttl")]
    dedup_ttl: Option<i64>,

    /// Enable the Prometheus exporter on this port
    #[arg(long = "metrics-port")]
    metrics_port: Option<u16>,

    /// Bind address for the Prometheus exporter
    #[arg(long = "metrics-addr", default_value = "0.0.0.0")]
    metrics_addr: String,

    /// JSON file of additional source configs
    #[arg(long = "sources")]
    sources: Option<PathBuf>,

    /// Run one iteration and exit
    #[arg(long)]
    once: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.verbose {
        "trend_monitor=debug".to_string()
    } else {
        "trend_monitor=info".to_string()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting trend-monitor v{}", env!("CARGO_PKG_VERSION"));

    let mut sources = default_sources();
    sources.extend(load_additional_sources(cli.sources.as_deref())?);
    if sources.is_empty() {
        tracing::warn!("no sources configured; pass --sources PATH to add any");
    }
    info!(count = sources.len(), "sources loaded");

    let http = Arc::new(HttpClient::new());
    let adapters = sources
        .into_iter()
        .map(|config| build_source(config, http.clone()))
        .collect();

    let storage = SnapshotStore::open(StorageConfig::new(cli.storage.clone()))
        .await
        .map(Arc::new)?;
    info!(path = %cli.storage, "snapshot store opened");

    let metrics = Arc::new(MetricsCollector::new(&MetricsConfig {
        port: cli.metrics_port,
        addr: cli.metrics_addr.clone(),
    }));

    let retention = chrono::Duration::minutes((cli.retention * 60.0) as i64);
    let dedup_ttl = match cli.dedup_ttl {
        Some(minutes) => chrono::Duration::minutes(minutes),
        None => retention,
    };
    let monitor_config = MonitorConfig {
        retention,
        decay_hours: cli.decay,
        min_score: cli.min_score,
        top_k: cli.top,
        dedup_ttl,
        fetch_concurrency: cli.fetch_concurrency,
        fetch_retry_attempts: cli.fetch_retries,
        fetch_retry_backoff: cli.fetch_backoff,
    };

    let mut monitor = TrendMonitor::with_clock(
        adapters,
        monitor_config,
        Some(storage),
        metrics,
        Arc::new(SystemClock),
    );

    if cli.once {
        let (generated_at, trends) = monitor.update().await;
        print_snapshot(generated_at, &trends);
        return Ok(());
    }

    loop {
        let (generated_at, trends) = monitor.update().await;
        print_snapshot(generated_at, &trends);

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(cli.interval)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal, exiting after final snapshot");
                break;
            }
        }
    }

    Ok(())
}

fn print_snapshot(generated_at: chrono::DateTime<chrono::Utc>, trends: &[Trend]) {
    println!("=== Топ трендов {} UTC ===", generated_at.to_rfc3339());
    for trend in trends {
        println!("#{} — score {:.3}", trend.keyword, trend.score);
        for item in trend.items.iter().take(3) {
            println!("    • {} ({})", item.title, item.url);
        }
    }
    println!();
}
