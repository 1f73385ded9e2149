use async_trait::async_trait;
use std::path::Path;

use super::models::{AccessToken, ExportStatus, ObjectFilter, ObjectPage};
use crate::error::SyncError;

/// Calls the pipeline makes against the storage/recording API.
///
/// Any non-2xx response is a hard failure mapped to the matching
/// [`SyncError`] variant.
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Exchange the configured client credentials for a bearer token.
    async fn fetch_token(&self) -> Result<AccessToken, SyncError>;

    /// List the regions the account has storage in.
    async fn list_regions(&self, token: &AccessToken) -> Result<Vec<String>, SyncError>;

    /// Fetch one page of objects matching `filter`. `page == None` is the first page.
    async fn find_objects(
        &self,
        token: &AccessToken,
        region: &str,
        filter: &ObjectFilter,
        page: Option<u32>,
    ) -> Result<ObjectPage, SyncError>;

    /// Start a bulk export and return the archive name the server assigned.
    async fn start_bulk_download(
        &self,
        token: &AccessToken,
        region: &str,
        object_ids: &[String],
    ) -> Result<String, SyncError>;

    async fn bulk_download_status(
        &self,
        token: &AccessToken,
        region: &str,
        archive_name: &str,
    ) -> Result<ExportStatus, SyncError>;

    /// Stream the archive to `dest`. Returns the number of bytes written.
    async fn download_archive(
        &self,
        token: &AccessToken,
        region: &str,
        archive_name: &str,
        dest: &Path,
    ) -> Result<u64, SyncError>;
}
