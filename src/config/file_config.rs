use super::Secret;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub work_dir: Option<String>,
    pub logging_level: Option<String>,

    // Collaborator sections
    pub storage: Option<StorageConfig>,
    pub export: Option<ExportConfig>,
    pub crm: Option<CrmConfig>,
    pub pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub api_base_url: Option<String>,
    pub home_region: Option<String>,
    /// Explicit region list; skips the regions endpoint when non-empty.
    pub regions: Option<Vec<String>>,
    pub client_id: Option<String>,
    pub client_secret: Option<Secret>,
    pub request_timeout_secs: Option<u64>,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub poll_interval_secs: Option<u64>,
    pub max_poll_attempts: Option<u32>,
    /// "abort" or "proceed"
    pub on_timeout: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CrmConfig {
    pub webhook_url: Option<Secret>,
    pub storage_id: Option<String>,
    pub attachment_field: Option<String>,
    /// "exact" or "suffix"
    pub match_strategy: Option<String>,
    pub suffix_digits: Option<usize>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub fail_fast: Option<bool>,
    pub retain_files: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
