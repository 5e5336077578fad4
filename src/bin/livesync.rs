//! livesync headless tail
//!
//! Connects to the store, keeps the configured streams in sync and logs every
//! new measurement as it arrives. It drives the scheduler from a plain loop on
//! the main thread, the same way a GUI would from its render loop.
//!
//! # CLI Commands
//!
//! - `run` - Poll the configured streams until interrupted (default)
//! - `check-config` - Validate the configuration and print it
//!
//! # Configuration
//!
//! Read from, in order:
//! 1. `--config <path>`
//! 2. `LIVESYNC_CONFIG` environment variable
//! 3. `./livesync.toml`
//! 4. Default configuration
//!
//! Environment overrides (`LIVESYNC_STORE_URL`, `LIVESYNC_STREAMS`,
//! `LIVESYNC_TICK_MS`, `RUST_LOG`) apply in every case.

use clap::{Parser, Subcommand};
use livesync::{
    config::Config,
    metrics,
    store::util::sanitize_url,
    sync::{Scheduler, StreamState},
    StoreConnection,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "livesync")]
#[command(version)]
#[command(about = "Keep in-memory time series in sync with an InfluxDB store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides LIVESYNC_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override store URL (e.g., http://localhost:8086?db=sensors)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Override the streams to sync (comma separated)
    #[arg(short, long, global = true, value_delimiter = ',')]
    streams: Option<Vec<String>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured streams until interrupted (default)
    Run {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Validate configuration and print the effective settings
    CheckConfig,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[config] {}", e);
            std::process::exit(2);
        },
    };
    if let Some(url) = cli.url {
        config.store.url = url;
    }
    if let Some(streams) = cli.streams {
        config.sync.streams = streams;
    }

    init_logging(&config.monitoring.log_level);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    let result = match cli.command.unwrap_or(Commands::Run { ticks: None }) {
        Commands::CheckConfig => check_config(&config),
        Commands::Run { ticks } => run(&config, ticks),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Load configuration from the first source that exists
fn load_config(explicit: Option<&Path>) -> livesync::Result<Config> {
    if let Some(path) = explicit {
        return Config::from_file_with_env(path);
    }

    if let Ok(path) = std::env::var("LIVESYNC_CONFIG") {
        return Config::from_file_with_env(path);
    }

    let local = Path::new("livesync.toml");
    if local.exists() {
        return Config::from_file_with_env(local);
    }

    Ok(Config::from_env())
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn check_config(config: &Config) -> livesync::Result<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| livesync::Error::Serialization(e.to_string()))?;
    // never print credentials
    let rendered = rendered.replace(&config.store.url, &sanitize_url(&config.store.url));
    println!("Configuration is valid:\n\n{}", rendered);
    Ok(())
}

fn run(config: &Config, max_ticks: Option<u64>) -> livesync::Result<()> {
    info!("Starting livesync v{}", env!("CARGO_PKG_VERSION"));
    metrics::init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("livesync-worker")
        .build()?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    info!(url = %sanitize_url(&config.store.url), "Connecting to store");
    let connection = Arc::new(StoreConnection::new());
    connection.connect(&config.store)?;

    let scheduler = Scheduler::new(connection, runtime.handle().clone());
    let mut streams: Vec<StreamState> = config
        .sync
        .streams
        .iter()
        .map(|name| scheduler.create_stream(name.as_str()))
        .collect();
    info!(streams = ?config.sync.streams, "Syncing streams");

    let tick = config.sync.tick_interval();
    let mut printed: Vec<usize> = vec![0; streams.len()];
    let mut ticks = 0u64;

    while !stop.load(Ordering::SeqCst) && max_ticks.map_or(true, |max| ticks < max) {
        let report = scheduler.poll(&mut streams);
        if report.changed() {
            for (stream, printed) in streams.iter().zip(printed.iter_mut()) {
                for m in &stream.series().as_slice()[*printed..] {
                    info!(stream = %stream.name(), timestamp = m.timestamp, value = m.value, "New measurement");
                }
                *printed = stream.series().len();
            }
        }

        ticks += 1;
        std::thread::sleep(tick);
    }

    for stream in &streams {
        let stats = stream.stats();
        info!(
            stream = %stream.name(),
            measurements = stream.series().len(),
            cursor = stream.cursor(),
            fetches = stats.fetches_started,
            failed = stats.fetches_failed,
            "Stream summary"
        );
        if let Some(err) = stream.last_error() {
            warn!(stream = %stream.name(), error = %err, "Last fetch failed");
        }
    }

    if config.monitoring.metrics_on_exit {
        match metrics::gather_metrics() {
            Ok(text) => info!("Metrics:\n{}", text),
            Err(e) => warn!("{}", e),
        }
    }

    // In-flight fetches get up to one request timeout to finish
    debug!("Shutting down runtime");
    runtime.shutdown_timeout(config.store.request_timeout().unwrap_or_default());
    Ok(())
}
