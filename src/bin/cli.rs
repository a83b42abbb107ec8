//! notice-relay CLI
//!
//! Runs the relay daemon, or single steps of it for operators.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use notice_relay::{
    config,
    error::Result,
    models::Config,
    pipeline::{NoticeCache, NoticeFilter, Pipeline, Scheduler},
    services::{HttpNoticeSource, NoticeSource, normalize_batch},
    storage::{LedgerStore, LocalStorage},
};
use tokio::sync::watch;

/// notice-relay - Notice board to messaging channel relay
#[derive(Parser, Debug)]
#[command(
    name = "notice-relay",
    version,
    about = "Relays notice board announcements to a messaging channel"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay: scheduled ingestion, retries and the query API
    Run {
        /// Start the first cycle immediately
        #[arg(long)]
        skip_warmup: bool,

        /// Do not start the query API
        #[arg(long)]
        no_server: bool,
    },

    /// Run a single ingestion cycle and exit
    Once,

    /// Fetch and print the current notices without delivering anything
    Preview {
        /// Case-insensitive subject filter
        #[arg(long)]
        subject: Option<String>,

        /// Date prefix filter, e.g. 03/01/2024
        #[arg(long)]
        date: Option<String>,
    },

    /// Validate configuration
    Validate,

    /// Show ledger info
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Future that resolves once `rx` observes a change.
fn stopped(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.changed().await;
    }
}

async fn run(config: Config, skip_warmup: bool, no_server: bool) -> Result<()> {
    let cache = Arc::new(NoticeCache::new());
    let pipeline = Pipeline::from_config(&config, Arc::clone(&cache)).await?;

    log::info!(
        "Relaying {} to {} every {}s",
        config.source.url,
        pipeline.destination(),
        config.schedule.ingest_interval_secs
    );

    let (scheduler, handle) = Scheduler::new(pipeline, config.schedule.clone());
    let (stop_tx, stop_rx) = watch::channel(false);

    #[cfg(feature = "server")]
    let server_task = if no_server {
        None
    } else {
        let listener = tokio::net::TcpListener::bind(config.server.addr()).await?;
        let state = Arc::new(notice_relay::server::AppState::new(
            Arc::clone(&cache),
            handle.clone(),
        ));
        Some(tokio::spawn(notice_relay::server::serve(
            listener,
            state,
            stopped(stop_rx.clone()),
        )))
    };

    #[cfg(not(feature = "server"))]
    if !no_server {
        log::warn!("Built without the `server` feature; query API disabled");
    }

    let scheduler_task = tokio::spawn(
        scheduler
            .skip_warmup(skip_warmup)
            .run(stopped(stop_rx)),
    );

    shutdown_signal().await;
    log::info!("Shutting down...");
    let _ = stop_tx.send(true);
    drop(handle);

    let pipeline = scheduler_task.await?;
    log::info!(
        "Stopped with {} delivered fingerprints and {} pending sends",
        pipeline.ledger().len(),
        pipeline.queue().pending().len()
    );

    #[cfg(feature = "server")]
    if let Some(task) = server_task {
        task.await??;
    }

    Ok(())
}

async fn once(config: Config) -> Result<()> {
    let cache = Arc::new(NoticeCache::new());
    let mut pipeline = Pipeline::from_config(&config, cache).await?;

    let report = pipeline.run_cycle().await?;
    log::info!(
        "Fetched {}, cached {}, new {}: {} delivered, {} queued",
        report.fetched,
        report.cached,
        report.new,
        report.delivery.delivered,
        report.delivery.queued
    );

    if !pipeline.queue().pending().is_empty() {
        let sweep = pipeline.retry_sweep().await;
        if sweep.requeued > 0 {
            log::warn!(
                "{} notices were not delivered and will not be retried",
                sweep.requeued
            );
        }
    }

    Ok(())
}

async fn preview(config: Config, filter: NoticeFilter) -> Result<()> {
    let source = HttpNoticeSource::new(&config.source)?;
    let raw = source.fetch().await?;
    let fetched = raw.len();

    let notices: Vec<_> = normalize_batch(raw)
        .into_iter()
        .filter(|notice| filter.matches(notice))
        .collect();

    log::info!("{} of {} fetched notices match", notices.len(), fetched);
    println!("{}", serde_json::to_string_pretty(&notices)?);
    Ok(())
}

async fn info(config: Config) -> Result<()> {
    let store = LocalStorage::new(config.storage.ledger_path.clone());
    log::info!("Source: {}", config.source.url);
    log::info!(
        "Gateway: {} (session {})",
        config.transport.endpoint,
        config.transport.session
    );
    log::info!("Destination: {}", config.delivery.destination);
    log::info!("Ledger: {}", store.location());

    match store.load().await {
        Ok(Some(fingerprints)) => {
            log::info!("Delivered fingerprints: {}", fingerprints.len())
        }
        Ok(None) => log::info!("No ledger written yet."),
        Err(e) => log::warn!("Ledger unreadable: {}", e),
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = config::load_config(&cli.config);
    let level = loaded
        .as_ref()
        .map(|config| config.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                cli.config.display(),
                e
            );
            config::default_config()
        }
    };

    match cli.command {
        Command::Run {
            skip_warmup,
            no_server,
        } => {
            config.validate()?;
            run(config, skip_warmup, no_server).await?;
        }

        Command::Once => {
            config.validate()?;
            once(config).await?;
        }

        Command::Preview { subject, date } => {
            preview(config, NoticeFilter { subject, date }).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info => info(config).await?,
    }

    Ok(())
}
