//! Scriptable in-memory storage API for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use super::api::StorageApi;
use super::models::{AccessToken, ExportStatus, ObjectFilter, ObjectPage, RemoteObject};
use crate::error::SyncError;

pub struct MockStorage {
    regions: Vec<String>,
    objects: Mutex<HashMap<String, Vec<RemoteObject>>>,
    statuses: Mutex<VecDeque<ExportStatus>>,
    last_status: Mutex<ExportStatus>,
    archive: Mutex<Vec<u8>>,
    failures: Mutex<HashMap<String, String>>,
    exported_ids: Mutex<Vec<Vec<String>>>,
    call_counts: Mutex<HashMap<String, usize>>,
    token_ttl: Mutex<Option<u64>>,
}

impl MockStorage {
    pub fn new(regions: &[&str]) -> Self {
        Self {
            regions: regions.iter().map(|r| r.to_string()).collect(),
            objects: Mutex::new(HashMap::new()),
            statuses: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(ExportStatus::Done),
            archive: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            exported_ids: Mutex::new(Vec::new()),
            call_counts: Mutex::new(HashMap::new()),
            token_ttl: Mutex::new(Some(3600)),
        }
    }

    /// Lifetime in seconds of the tokens handed out by `fetch_token`.
    pub fn set_token_ttl(&self, ttl: Option<u64>) {
        *self.token_ttl.lock().unwrap() = ttl;
    }

    pub fn add_object(&self, region: &str, id: &str) {
        self.objects
            .lock()
            .unwrap()
            .entry(region.to_string())
            .or_default()
            .push(RemoteObject {
                id: id.to_string(),
                region: region.to_string(),
                state: Some("AVAILABLE".to_string()),
            });
    }

    /// Statuses returned by successive status checks. Once the script runs
    /// out, the last returned status repeats.
    pub fn set_statuses(&self, statuses: Vec<ExportStatus>) {
        *self.statuses.lock().unwrap() = statuses.into();
    }

    pub fn set_archive(&self, bytes: Vec<u8>) {
        *self.archive.lock().unwrap() = bytes;
    }

    /// Make `method` fail with `message` on every call.
    pub fn fail(&self, method: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(method.to_string(), message.to_string());
    }

    pub fn get_call_count(&self, method: &str) -> usize {
        *self.call_counts.lock().unwrap().get(method).unwrap_or(&0)
    }

    pub fn exported_ids(&self) -> Vec<Vec<String>> {
        self.exported_ids.lock().unwrap().clone()
    }

    fn increment_call(&self, method: &str) {
        let mut counts = self.call_counts.lock().unwrap();
        *counts.entry(method.to_string()).or_insert(0) += 1;
    }

    fn failure(&self, method: &str) -> Option<String> {
        self.failures.lock().unwrap().get(method).cloned()
    }
}

#[async_trait]
impl StorageApi for MockStorage {
    async fn fetch_token(&self) -> Result<AccessToken, SyncError> {
        self.increment_call("fetch_token");
        if let Some(message) = self.failure("fetch_token") {
            return Err(SyncError::Auth(message));
        }
        let ttl = *self.token_ttl.lock().unwrap();
        Ok(AccessToken::new("mock-token", ttl))
    }

    async fn list_regions(&self, _token: &AccessToken) -> Result<Vec<String>, SyncError> {
        self.increment_call("list_regions");
        if let Some(message) = self.failure("list_regions") {
            return Err(SyncError::Lookup {
                region: "home".to_string(),
                message,
            });
        }
        Ok(self.regions.clone())
    }

    async fn find_objects(
        &self,
        _token: &AccessToken,
        region: &str,
        filter: &ObjectFilter,
        _page: Option<u32>,
    ) -> Result<ObjectPage, SyncError> {
        self.increment_call("find_objects");
        if let Some(message) = self.failure("find_objects") {
            return Err(SyncError::Lookup {
                region: region.to_string(),
                message,
            });
        }
        let objects = self
            .objects
            .lock()
            .unwrap()
            .get(region)
            .cloned()
            .unwrap_or_default();
        let content = match filter {
            ObjectFilter::AllAvailable => objects,
            ObjectFilter::ById(id) => objects.into_iter().filter(|o| &o.id == id).collect(),
        };
        Ok(ObjectPage {
            content,
            ..Default::default()
        })
    }

    async fn start_bulk_download(
        &self,
        _token: &AccessToken,
        region: &str,
        object_ids: &[String],
    ) -> Result<String, SyncError> {
        self.increment_call("start_bulk_download");
        if let Some(message) = self.failure("start_bulk_download") {
            return Err(SyncError::ExportStart(message));
        }
        self.exported_ids.lock().unwrap().push(object_ids.to_vec());
        Ok(format!("bulk-{}.zip", region))
    }

    async fn bulk_download_status(
        &self,
        _token: &AccessToken,
        _region: &str,
        _archive_name: &str,
    ) -> Result<ExportStatus, SyncError> {
        self.increment_call("bulk_download_status");
        if let Some(message) = self.failure("bulk_download_status") {
            return Err(SyncError::ExportStatus(message));
        }
        let mut last = self.last_status.lock().unwrap();
        if let Some(next) = self.statuses.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }

    async fn download_archive(
        &self,
        _token: &AccessToken,
        _region: &str,
        _archive_name: &str,
        dest: &Path,
    ) -> Result<u64, SyncError> {
        self.increment_call("download_archive");
        if let Some(message) = self.failure("download_archive") {
            return Err(SyncError::Download(message));
        }
        let bytes = self.archive.lock().unwrap().clone();
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &bytes)?;
        Ok(bytes.len() as u64)
    }
}
