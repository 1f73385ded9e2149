mod file_config;
mod secret;

pub use file_config::{CrmConfig, ExportConfig, FileConfig, PipelineConfig, StorageConfig};
pub use secret::Secret;

use crate::crm::{MatchStrategy, MatchStrategyKind};
use crate::export::TimeoutAction;
use crate::server::RequestsLoggingLevel;
use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_STORAGE_API_BASE_URL: &str = "https://api.8x8.com";
pub const DEFAULT_WORK_DIR: &str = "extracted_files";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub work_dir: Option<PathBuf>,
    pub logging_level: RequestsLoggingLevel,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,

    pub storage: StorageSettings,
    pub export: ExportSettings,
    pub crm: CrmSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub api_base_url: String,
    pub home_region: Option<String>,
    pub regions: Vec<String>,
    pub client_id: String,
    pub client_secret: Secret,
    pub request_timeout_secs: u64,
    pub max_pages: u32,
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub on_timeout: TimeoutAction,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
            max_poll_attempts: 20,
            on_timeout: TimeoutAction::Abort,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrmSettings {
    /// Webhook base URL. Carries the CRM credential in its path.
    pub webhook_url: Secret,
    pub storage_id: Option<String>,
    pub attachment_field: String,
    pub match_strategy: MatchStrategy,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub work_dir: PathBuf,
    pub fail_fast: bool,
    pub retain_files: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            fail_fast: false,
            retain_files: false,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let work_dir = file
            .work_dir
            .map(PathBuf::from)
            .or_else(|| cli.work_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR));

        let storage = resolve_storage(file.storage.unwrap_or_default())?;
        let export = resolve_export(file.export.unwrap_or_default())?;
        let crm = resolve_crm(file.crm.unwrap_or_default())?;

        let pipeline_file = file.pipeline.unwrap_or_default();
        let pipeline = PipelineSettings {
            work_dir,
            fail_fast: pipeline_file.fail_fast.unwrap_or(false),
            retain_files: pipeline_file.retain_files.unwrap_or(false),
        };

        Ok(Self {
            port,
            metrics_port,
            logging_level,
            storage,
            export,
            crm,
            pipeline,
        })
    }
}

fn resolve_storage(file: StorageConfig) -> Result<StorageSettings> {
    let client_id = file
        .client_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| anyhow!("storage.client_id must be specified in config file"))?;

    let client_secret = file
        .client_secret
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("storage.client_secret must be specified in config file"))?;

    let regions = file.regions.unwrap_or_default();
    let home_region = file.home_region.filter(|r| !r.trim().is_empty());
    if regions.is_empty() && home_region.is_none() {
        bail!("Either storage.home_region or storage.regions must be specified");
    }

    let max_pages = file.max_pages.unwrap_or(50);
    if max_pages == 0 {
        bail!("storage.max_pages must be at least 1");
    }

    Ok(StorageSettings {
        api_base_url: file
            .api_base_url
            .unwrap_or_else(|| DEFAULT_STORAGE_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string(),
        home_region,
        regions,
        client_id,
        client_secret,
        request_timeout_secs: file.request_timeout_secs.unwrap_or(60),
        max_pages,
    })
}

fn resolve_export(file: ExportConfig) -> Result<ExportSettings> {
    let defaults = ExportSettings::default();

    let on_timeout = match file.on_timeout {
        Some(s) => TimeoutAction::from_str(&s, true)
            .map_err(|_| anyhow!("Invalid export.on_timeout value: {}", s))?,
        None => defaults.on_timeout,
    };

    let max_poll_attempts = file
        .max_poll_attempts
        .unwrap_or(defaults.max_poll_attempts);
    if max_poll_attempts == 0 {
        bail!("export.max_poll_attempts must be at least 1");
    }

    Ok(ExportSettings {
        poll_interval_secs: file
            .poll_interval_secs
            .unwrap_or(defaults.poll_interval_secs),
        max_poll_attempts,
        on_timeout,
    })
}

fn resolve_crm(file: CrmConfig) -> Result<CrmSettings> {
    let webhook_url = file
        .webhook_url
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("crm.webhook_url must be specified in config file"))?;

    let attachment_field = file
        .attachment_field
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| anyhow!("crm.attachment_field must be specified in config file"))?;

    let kind = match file.match_strategy {
        Some(s) => MatchStrategyKind::from_str(&s, true)
            .map_err(|_| anyhow!("Invalid crm.match_strategy value: {}", s))?,
        None => MatchStrategyKind::Exact,
    };
    let match_strategy = match kind {
        MatchStrategyKind::Exact => MatchStrategy::Exact,
        MatchStrategyKind::Suffix => {
            let digits = file.suffix_digits.unwrap_or(4);
            if digits == 0 {
                bail!("crm.suffix_digits must be at least 1");
            }
            MatchStrategy::Suffix { digits }
        }
    };

    Ok(CrmSettings {
        webhook_url,
        storage_id: file.storage_id,
        attachment_field,
        match_strategy,
        request_timeout_secs: file.request_timeout_secs.unwrap_or(60),
    })
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
