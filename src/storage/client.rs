//! HTTP client for the storage/recording API.

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::api::StorageApi;
use super::models::{
    AccessToken, BulkStartResponse, BulkStatusResponse, ExportStatus, ObjectFilter, ObjectPage,
    RegionEntry, TokenResponse,
};
use crate::config::{Secret, StorageSettings};
use crate::error::{describe_http_error, SyncError};

/// Client for the storage API: token, regions, object search and bulk export.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    base_url: String,
    home_region: Option<String>,
    client_id: String,
    client_secret: Secret,
}

impl StorageClient {
    /// Create a new StorageClient from the resolved storage settings.
    pub fn new(settings: &StorageSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            home_region: settings.home_region.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        })
    }

    /// Get the base URL of the storage API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/storage/{region}/v3/{segments...}` with every segment
    /// percent-encoded on its own.
    fn region_url(&self, region: &str, segments: &[&str]) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid storage base URL: {}", e))?;
        url.path_segments_mut()
            .map_err(|_| "Storage base URL cannot carry a path".to_string())?
            .pop_if_empty()
            .extend(["storage", region, "v3"])
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl StorageApi for StorageClient {
    async fn fetch_token(&self) -> Result<AccessToken, SyncError> {
        let url = format!("{}/oauth/v2/token", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SyncError::Auth(describe_http_error(e)))?;

        if !response.status().is_success() {
            return Err(SyncError::Auth(format!(
                "Token request failed with status: {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("Malformed token response: {}", describe_http_error(e))))?;

        let value = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::Auth("Token response has no access_token".to_string()))?;

        debug!("Access token acquired (expires_in={:?})", body.expires_in);
        Ok(AccessToken::new(value, body.expires_in))
    }

    async fn list_regions(&self, token: &AccessToken) -> Result<Vec<String>, SyncError> {
        let home = self.home_region.clone().unwrap_or_default();
        let lookup_err = |message: String| SyncError::Lookup {
            region: home.clone(),
            message,
        };

        let url = self.region_url(&home, &["regions"]).map_err(lookup_err)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token.bearer())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| lookup_err(describe_http_error(e)))?;

        if !response.status().is_success() {
            return Err(lookup_err(format!(
                "Regions request failed with status: {}",
                response.status()
            )));
        }

        let entries: Vec<RegionEntry> = response
            .json()
            .await
            .map_err(|e| lookup_err(format!("Malformed regions response: {}", describe_http_error(e))))?;

        Ok(entries.into_iter().map(RegionEntry::into_name).collect())
    }

    async fn find_objects(
        &self,
        token: &AccessToken,
        region: &str,
        filter: &ObjectFilter,
        page: Option<u32>,
    ) -> Result<ObjectPage, SyncError> {
        let lookup_err = |message: String| SyncError::Lookup {
            region: region.to_string(),
            message,
        };

        let url = self.region_url(region, &["objects"]).map_err(lookup_err)?;
        let mut query = vec![("filter", filter.to_string())];
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(token.bearer())
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await
            .map_err(|e| lookup_err(describe_http_error(e)))?;

        if !response.status().is_success() {
            return Err(lookup_err(format!(
                "Object search failed with status: {}",
                response.status()
            )));
        }

        let mut page: ObjectPage = response
            .json()
            .await
            .map_err(|e| lookup_err(format!("Malformed object page: {}", describe_http_error(e))))?;

        for object in page.content.iter_mut() {
            object.region = region.to_string();
        }
        Ok(page)
    }

    async fn start_bulk_download(
        &self,
        token: &AccessToken,
        region: &str,
        object_ids: &[String],
    ) -> Result<String, SyncError> {
        let url = self
            .region_url(region, &["bulk", "download", "start"])
            .map_err(SyncError::ExportStart)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token.bearer())
            .json(object_ids)
            .send()
            .await
            .map_err(|e| SyncError::ExportStart(describe_http_error(e)))?;

        if !response.status().is_success() {
            return Err(SyncError::ExportStart(format!(
                "Bulk download start failed with status: {}",
                response.status()
            )));
        }

        let body: BulkStartResponse = response.json().await.map_err(|e| {
            SyncError::ExportStart(format!("Malformed start response: {}", describe_http_error(e)))
        })?;

        body.zip_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SyncError::ExportStart("Start response has no zipName".to_string()))
    }

    async fn bulk_download_status(
        &self,
        token: &AccessToken,
        region: &str,
        archive_name: &str,
    ) -> Result<ExportStatus, SyncError> {
        let url = self
            .region_url(region, &["bulk", "download", "status", archive_name])
            .map_err(SyncError::ExportStatus)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token.bearer())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SyncError::ExportStatus(describe_http_error(e)))?;

        if !response.status().is_success() {
            return Err(SyncError::ExportStatus(format!(
                "Status check for {} failed with status: {}",
                archive_name,
                response.status()
            )));
        }

        let body: BulkStatusResponse = response.json().await.map_err(|e| {
            SyncError::ExportStatus(format!("Malformed status response: {}", describe_http_error(e)))
        })?;

        Ok(body
            .status
            .map(|s| ExportStatus::from_api(&s))
            .unwrap_or_else(|| ExportStatus::Other("UNKNOWN".to_string())))
    }

    async fn download_archive(
        &self,
        token: &AccessToken,
        region: &str,
        archive_name: &str,
        dest: &Path,
    ) -> Result<u64, SyncError> {
        let url = self
            .region_url(region, &["bulk", "download", archive_name])
            .map_err(SyncError::Download)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token.bearer())
            .send()
            .await
            .map_err(|e| SyncError::Download(describe_http_error(e)))?;

        if !response.status().is_success() {
            return Err(SyncError::Download(format!(
                "Download of {} failed with status: {}",
                archive_name,
                response.status()
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(dest).await?;
        let mut written: u64 = 0;

        // Stream response to file
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SyncError::Download(describe_http_error(e)))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(written)
    }
}
