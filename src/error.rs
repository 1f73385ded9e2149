//! Error taxonomy for a pipeline run.
//!
//! Run-level and region-level failures travel as `SyncError`. Per-file
//! failures are wrapped into the file outcome instead of aborting the batch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Object lookup failed in region {region}: {message}")]
    Lookup { region: String, message: String },

    #[error("Failed to start bulk export: {0}")]
    ExportStart(String),

    #[error("Failed to check bulk export status: {0}")]
    ExportStatus(String),

    #[error("Bulk export {archive_name} failed with status {status}")]
    ExportFailed {
        archive_name: String,
        status: String,
    },

    #[error(
        "Bulk export {archive_name} not done after {attempts} status checks (last status: {last_status})"
    )]
    ExportTimeout {
        archive_name: String,
        attempts: u32,
        last_status: String,
    },

    #[error("Archive download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extraction(String),

    #[error("Lead search failed: {0}")]
    LeadSearch(String),

    #[error("File upload failed: {0}")]
    Upload(String),

    #[error("Attaching file to lead {lead_id} failed: {message}")]
    Attach { lead_id: String, message: String },

    #[error("Post-processing failed: {0}")]
    PostProcess(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Short label used for metrics and file outcome stages.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Auth(_) => "auth",
            SyncError::Lookup { .. } => "lookup",
            SyncError::ExportStart(_) => "export_start",
            SyncError::ExportStatus(_) => "export_status",
            SyncError::ExportFailed { .. } => "export_failed",
            SyncError::ExportTimeout { .. } => "export_timeout",
            SyncError::Download(_) => "download",
            SyncError::Extraction(_) => "extraction",
            SyncError::LeadSearch(_) => "lead_search",
            SyncError::Upload(_) => "upload",
            SyncError::Attach { .. } => "attach",
            SyncError::PostProcess(_) => "post_process",
            SyncError::Cancelled => "cancelled",
            SyncError::Io(_) => "io",
        }
    }
}

/// Formats a transport error without the request URL.
///
/// CRM webhook URLs embed their credential in the path, so the URL must never
/// reach a log line or a response body.
pub fn describe_http_error(err: reqwest::Error) -> String {
    err.without_url().to_string()
}
