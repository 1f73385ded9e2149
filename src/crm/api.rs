use async_trait::async_trait;
use std::path::Path;

use super::models::Lead;
use crate::error::SyncError;

/// Calls the correlator makes against the CRM.
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Leads whose phone field matches `key`.
    async fn find_leads(&self, key: &str) -> Result<Vec<Lead>, SyncError>;

    /// Upload a local file and return the URL the CRM stored it under.
    async fn upload_file(&self, path: &Path, file_name: &str) -> Result<String, SyncError>;

    /// Point the lead's attachment field at `file_url`.
    async fn attach_file(&self, lead_id: &str, file_url: &str) -> Result<(), SyncError>;

    /// Add a comment to the lead timeline.
    async fn add_comment(&self, lead_id: &str, text: &str) -> Result<(), SyncError>;
}
