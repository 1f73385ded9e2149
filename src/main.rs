use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recordings_bridge::config::{AppConfig, CliConfig, FileConfig};
use recordings_bridge::crm::CrmClient;
use recordings_bridge::server::{metrics, run_server, ServerConfig, ServerState};
use recordings_bridge::storage::StorageClient;
use recordings_bridge::{RecordingPipeline, RequestsLoggingLevel};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the TOML config file (storage and CRM credentials live there).
    #[clap(long, value_parser = parse_path)]
    pub config: PathBuf,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// Directory where archives are downloaded and extracted.
    #[clap(long, value_parser = parse_path)]
    pub work_dir: Option<PathBuf>,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let cli_config = CliConfig {
        port: cli_args.port,
        metrics_port: cli_args.metrics_port,
        work_dir: cli_args.work_dir,
        logging_level: cli_args.logging_level,
    };

    info!("Loading config from {:?}...", cli_args.config);
    let file_config = FileConfig::load(&cli_args.config)?;
    let config = AppConfig::resolve(&cli_config, Some(file_config))
        .context("Invalid configuration")?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let storage = Arc::new(StorageClient::new(&config.storage)?);
    let crm = Arc::new(CrmClient::new(&config.crm)?);
    info!(
        "Storage API at {}, matching leads by {} phone",
        storage.base_url(),
        config.crm.match_strategy
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                signal_token.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let pipeline = RecordingPipeline::new(storage, crm, &config, shutdown.clone());
    info!("Working directory {:?}", pipeline.work_dir());

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        metrics_port: config.metrics_port,
    };
    let state = ServerState::new(server_config, Arc::new(pipeline), env!("BUILD_HASH"));

    run_server(state, shutdown).await
}
