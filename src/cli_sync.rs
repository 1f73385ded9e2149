//! One-shot pipeline run from the command line.
//!
//! Prints the run report as JSON on stdout. Logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recordings_bridge::config::{AppConfig, CliConfig, FileConfig};
use recordings_bridge::crm::CrmClient;
use recordings_bridge::storage::StorageClient;
use recordings_bridge::{RecordingPipeline, RecordingSelector};

#[derive(Parser, Debug)]
#[command(name = "sync-once", about = "Run the recordings pipeline once")]
struct CliArgs {
    /// Path to the TOML config file.
    #[clap(long)]
    pub config: PathBuf,

    /// Process a single recording instead of every available one.
    #[clap(long)]
    pub object_id: Option<String>,

    /// Directory where archives are downloaded and extracted.
    #[clap(long)]
    pub work_dir: Option<PathBuf>,

    /// Keep downloaded archives and extracted files after the run.
    #[clap(long)]
    pub retain_files: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let selector = match cli_args.object_id {
        Some(id) if !RecordingSelector::is_safe_object_id(&id) => {
            bail!("Invalid object id: {:?}", id)
        }
        Some(id) => RecordingSelector::Object(id),
        None => RecordingSelector::All,
    };

    let cli_config = CliConfig {
        work_dir: cli_args.work_dir,
        ..Default::default()
    };
    let file_config = FileConfig::load(&cli_args.config)?;
    let mut config = AppConfig::resolve(&cli_config, Some(file_config))
        .context("Invalid configuration")?;
    if cli_args.retain_files {
        config.pipeline.retain_files = true;
    }

    let storage = Arc::new(StorageClient::new(&config.storage)?);
    let crm = Arc::new(CrmClient::new(&config.crm)?);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling run...");
            signal_token.cancel();
        }
    });

    let pipeline = RecordingPipeline::new(storage, crm, &config, cancel);
    let report = match pipeline.run(selector).await {
        Ok(report) => report,
        Err(e) => {
            error!("Run failed: {}", e);
            bail!("Run failed: {}", e);
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.has_failed_regions() {
        bail!(
            "{} of {} regions failed",
            report.totals.failed_regions,
            report.regions.len()
        );
    }
    Ok(())
}
