//! In-memory CRM for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::api::CrmApi;
use super::models::Lead;
use crate::error::SyncError;

#[derive(Default)]
pub struct MockCrm {
    leads: Mutex<HashMap<String, Vec<Lead>>>,
    failures: Mutex<HashMap<String, String>>,
    /// Files whose upload fails, by file name.
    failing_uploads: Mutex<Vec<String>>,
    uploads: Mutex<Vec<String>>,
    attachments: Mutex<Vec<(String, String)>>,
    comments: Mutex<Vec<(String, String)>>,
    searches: Mutex<Vec<String>>,
    /// Methods that never return.
    stalled: Mutex<Vec<String>>,
    call_counts: Mutex<HashMap<String, usize>>,
}

impl MockCrm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leads returned when searching for exactly `key`.
    pub fn add_leads(&self, key: &str, leads: Vec<Lead>) {
        self.leads.lock().unwrap().insert(key.to_string(), leads);
    }

    pub fn fail(&self, method: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(method.to_string(), message.to_string());
    }

    pub fn stall(&self, method: &str) {
        self.stalled.lock().unwrap().push(method.to_string());
    }

    pub fn fail_upload_of(&self, file_name: &str) {
        self.failing_uploads
            .lock()
            .unwrap()
            .push(file_name.to_string());
    }

    pub fn get_call_count(&self, method: &str) -> usize {
        *self.call_counts.lock().unwrap().get(method).unwrap_or(&0)
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn attachments(&self) -> Vec<(String, String)> {
        self.attachments.lock().unwrap().clone()
    }

    pub fn comments(&self) -> Vec<(String, String)> {
        self.comments.lock().unwrap().clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    fn increment_call(&self, method: &str) {
        let mut counts = self.call_counts.lock().unwrap();
        *counts.entry(method.to_string()).or_insert(0) += 1;
    }

    fn is_stalled(&self, method: &str) -> bool {
        self.stalled.lock().unwrap().iter().any(|m| m == method)
    }

    fn failure(&self, method: &str) -> Option<String> {
        self.failures.lock().unwrap().get(method).cloned()
    }
}

#[async_trait]
impl CrmApi for MockCrm {
    async fn find_leads(&self, key: &str) -> Result<Vec<Lead>, SyncError> {
        self.increment_call("find_leads");
        self.searches.lock().unwrap().push(key.to_string());
        if self.is_stalled("find_leads") {
            std::future::pending::<()>().await;
        }
        if let Some(message) = self.failure("find_leads") {
            return Err(SyncError::LeadSearch(message));
        }
        Ok(self
            .leads
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn upload_file(&self, _path: &Path, file_name: &str) -> Result<String, SyncError> {
        self.increment_call("upload_file");
        if let Some(message) = self.failure("upload_file") {
            return Err(SyncError::Upload(message));
        }
        if self
            .failing_uploads
            .lock()
            .unwrap()
            .iter()
            .any(|f| f == file_name)
        {
            return Err(SyncError::Upload(format!("rejected {}", file_name)));
        }
        self.uploads.lock().unwrap().push(file_name.to_string());
        Ok(format!("https://crm.test/files/{}", file_name))
    }

    async fn attach_file(&self, lead_id: &str, file_url: &str) -> Result<(), SyncError> {
        self.increment_call("attach_file");
        if let Some(message) = self.failure("attach_file") {
            return Err(SyncError::Attach {
                lead_id: lead_id.to_string(),
                message,
            });
        }
        self.attachments
            .lock()
            .unwrap()
            .push((lead_id.to_string(), file_url.to_string()));
        Ok(())
    }

    async fn add_comment(&self, lead_id: &str, text: &str) -> Result<(), SyncError> {
        self.increment_call("add_comment");
        if let Some(message) = self.failure("add_comment") {
            return Err(SyncError::PostProcess(message));
        }
        self.comments
            .lock()
            .unwrap()
            .push((lead_id.to_string(), text.to_string()));
        Ok(())
    }
}
