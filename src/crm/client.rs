//! HTTP client for the CRM REST webhook.
//!
//! The webhook URL embeds the CRM credential, so it is never logged and
//! transport errors are stripped of their URL before they are reported.

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::api::CrmApi;
use super::models::{CrmErrorBody, Lead, LeadListResponse, ResultResponse, UploadResponse};
use crate::config::{CrmSettings, Secret};
use crate::error::{describe_http_error, SyncError};

#[derive(Clone)]
pub struct CrmClient {
    client: Client,
    webhook_url: Secret,
    storage_id: Option<String>,
    attachment_field: String,
}

impl CrmClient {
    pub fn new(settings: &CrmSettings) -> Result<Self> {
        let webhook = settings.webhook_url.expose().trim_end_matches('/');
        if !(webhook.starts_with("http://") || webhook.starts_with("https://")) {
            bail!("crm.webhook_url must be an http(s) URL");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            webhook_url: Secret::new(webhook),
            storage_id: settings.storage_id.clone(),
            attachment_field: settings.attachment_field.clone(),
        })
    }

    pub fn attachment_field(&self) -> &str {
        &self.attachment_field
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.webhook_url.expose(), method)
    }
}

/// Error message for a non-2xx response, with the CRM error code when the
/// body carries one.
async fn failure_message(action: &str, response: Response) -> String {
    let status = response.status();
    let detail = response
        .json::<CrmErrorBody>()
        .await
        .ok()
        .and_then(|body| body.summary());
    match detail {
        Some(detail) => format!("{} failed with status {}: {}", action, status, detail),
        None => format!("{} failed with status {}", action, status),
    }
}

#[async_trait]
impl CrmApi for CrmClient {
    async fn find_leads(&self, key: &str) -> Result<Vec<Lead>, SyncError> {
        let response = self
            .client
            .get(self.method_url("crm.lead.list.json"))
            .query(&[
                ("filter[PHONE]", key),
                ("select[]", "ID"),
                ("select[]", "PHONE"),
            ])
            .send()
            .await
            .map_err(|e| SyncError::LeadSearch(describe_http_error(e)))?;

        if !response.status().is_success() {
            return Err(SyncError::LeadSearch(
                failure_message("Lead search", response).await,
            ));
        }

        let body: LeadListResponse = response.json().await.map_err(|e| {
            SyncError::LeadSearch(format!("Malformed lead list: {}", describe_http_error(e)))
        })?;

        debug!("Lead search returned {} leads", body.result.len());
        Ok(body.result)
    }

    async fn upload_file(&self, path: &Path, file_name: &str) -> Result<String, SyncError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SyncError::Upload(format!("Cannot open {}: {}", file_name, e)))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| SyncError::Upload(format!("Cannot stat {}: {}", file_name, e)))?
            .len();

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, length).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let mut request = self
            .client
            .post(self.method_url("disk.storage.uploadfile.json"))
            .multipart(form);
        if let Some(storage_id) = &self.storage_id {
            request = request.query(&[("id", storage_id.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Upload(describe_http_error(e)))?;

        if !response.status().is_success() {
            return Err(SyncError::Upload(
                failure_message(&format!("Upload of {}", file_name), response).await,
            ));
        }

        let body: UploadResponse = response.json().await.map_err(|e| {
            SyncError::Upload(format!("Malformed upload response: {}", describe_http_error(e)))
        })?;

        let url = body
            .into_file_url()
            .ok_or_else(|| SyncError::Upload("Upload response has no file url".to_string()))?;
        debug!("Uploaded {} ({} bytes)", file_name, length);
        Ok(url)
    }

    async fn attach_file(&self, lead_id: &str, file_url: &str) -> Result<(), SyncError> {
        let attach_err = |message: String| SyncError::Attach {
            lead_id: lead_id.to_string(),
            message,
        };

        let field = format!("fields[{}]", self.attachment_field);
        let response = self
            .client
            .post(self.method_url("crm.lead.update.json"))
            .form(&[("ID", lead_id), (field.as_str(), file_url)])
            .send()
            .await
            .map_err(|e| attach_err(describe_http_error(e)))?;

        if !response.status().is_success() {
            return Err(attach_err(failure_message("Lead update", response).await));
        }

        let body: ResultResponse = response
            .json()
            .await
            .map_err(|e| attach_err(format!("Malformed update response: {}", describe_http_error(e))))?;
        if body.is_refused() {
            return Err(attach_err("Lead update was refused".to_string()));
        }
        Ok(())
    }

    async fn add_comment(&self, lead_id: &str, text: &str) -> Result<(), SyncError> {
        let payload = json!({
            "fields": {
                "ENTITY_ID": lead_id,
                "ENTITY_TYPE": "lead",
                "COMMENT": text,
            }
        });

        let response = self
            .client
            .post(self.method_url("crm.timeline.comment.add.json"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SyncError::PostProcess(describe_http_error(e)))?;

        if !response.status().is_success() {
            return Err(SyncError::PostProcess(
                failure_message("Timeline comment", response).await,
            ));
        }
        Ok(())
    }
}
