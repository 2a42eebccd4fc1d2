mod abi;
mod config;
mod error;
mod events;
mod fetcher;
mod filters;
mod metrics;
mod server;
mod state;
mod tui;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::{Result, WrapErr};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::abi::InterfaceDecoder;
use crate::config::AppConfig;
use crate::fetcher::{EtherscanFetcher, EventsClient};
use crate::filters::TimeWindow;
use crate::metrics::{Snapshot, ViewSelection};
use crate::state::AppState;
use crate::tui::DashboardInfo;

#[derive(Parser)]
#[command(name = "evm_event_metrics")]
#[command(about = "Time-windowed event metrics for a single contract", long_about = None)]
struct Cli {
    /// Config file name, without extension
    #[arg(short, long, default_value = "config")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve POST /api/fetch-events
    Serve {
        /// Overrides server.bind
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Interactive terminal dashboard
    Dashboard,

    /// Fetch once and print the aggregated view as JSON
    Report {
        /// 1d, 7d, 30d or all
        #[arg(short, long)]
        window: Option<TimeWindow>,

        /// Ignore the blacklist for this report
        #[arg(long)]
        no_blacklist: bool,
    },
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config).wrap_err("Failed to load config")?;

    match cli.command {
        Command::Serve { bind } => {
            init_stderr_logging();
            serve(config, bind).await
        }
        Command::Dashboard => dashboard(config).await,
        Command::Report {
            window,
            no_blacklist,
        } => {
            init_stderr_logging();
            report(config, window, no_blacklist).await
        }
    }
}

async fn serve(config: AppConfig, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or(config.server.bind);

    if config.upstream.rpc_url.is_none() || config.upstream.api_key.is_none() {
        warn!("RPC_URL or ETHERSCAN_API_KEY not set, fetch requests will fail");
    }
    info!("Contract: {}", config.upstream.contract_address);
    info!("Start block: {}", config.upstream.start_block);

    let fetcher = Arc::new(EtherscanFetcher::new(config.upstream)?);
    server::serve(&bind, fetcher).await.wrap_err("Server failed")
}

async fn dashboard(config: AppConfig) -> Result<()> {
    // The terminal is owned by the UI, so logs go to a file.
    let file_appender = tracing_appender::rolling::daily(&config.dashboard.log_dir, "metrics.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    info!("Starting contract metrics dashboard");

    let dashboard = config.dashboard;
    let blacklist = dashboard
        .load_blacklist()
        .wrap_err("Failed to load blacklist")?;
    info!("Blacklist: {} addresses", blacklist.len());

    let state = Arc::new(AppState::new(
        dashboard.default_window,
        blacklist,
        dashboard.blacklist_enabled,
    ));
    let client = EventsClient::new(
        &dashboard.endpoint,
        Duration::from_secs(dashboard.request_timeout_secs),
    )?;

    let (reload_tx, mut reload_rx) = mpsc::channel::<()>(1);

    match InterfaceDecoder::from_path(&dashboard.abi_path) {
        Ok(decoder) => {
            let loader_state = state.clone();
            tokio::spawn(async move {
                while reload_rx.recv().await.is_some() {
                    let generation = loader_state.begin_load();
                    info!("Load {} started", generation);
                    let result = client.load(&decoder).await;
                    loader_state.finish_load(generation, result);
                }
            });
            reload_tx.send(()).await.ok();
        }
        Err(e) => {
            error!("{}", e);
            state.fail(&e);
        }
    }

    let info = DashboardInfo {
        contract: config.upstream.contract_address.to_string(),
        explorer_tx_url: dashboard.explorer_tx_url,
    };

    // Runs blocking on the main thread
    let result = tui::run_tui(state.clone(), reload_tx, info);
    state.close();
    result
}

async fn report(config: AppConfig, window: Option<TimeWindow>, no_blacklist: bool) -> Result<()> {
    let dashboard = config.dashboard;
    let decoder = InterfaceDecoder::from_path(&dashboard.abi_path)?;
    let blacklist = dashboard
        .load_blacklist()
        .wrap_err("Failed to load blacklist")?;
    let client = EventsClient::new(
        &dashboard.endpoint,
        Duration::from_secs(dashboard.request_timeout_secs),
    )?;

    let loaded = client.load(&decoder).await?;
    info!(
        "Loaded {} events up to block {}",
        loaded.events.len(),
        loaded.end_block
    );

    let selection = ViewSelection {
        window: window.unwrap_or(dashboard.default_window),
        blacklist_enabled: dashboard.blacklist_enabled && !no_blacklist && !blacklist.is_empty(),
        blacklist,
    };
    let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let snapshot = Snapshot::compute(&loaded.events, &selection, now_ms);

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
