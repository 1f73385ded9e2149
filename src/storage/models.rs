//! Models for the storage API requests and responses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Tokens are treated as expired slightly before the server says so.
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

// =============================================================================
// Credentials
// =============================================================================

/// Short-lived bearer credential for the storage API.
///
/// Never cached across runs and never persisted. `Debug` is redacted.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_at: Option<Instant>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_in_secs: Option<u64>) -> Self {
        Self {
            value: value.into(),
            expires_at: expires_in_secs
                .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs))),
        }
    }

    /// Raw bearer value, only for building the `Authorization` header.
    pub fn bearer(&self) -> &str {
        &self.value
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() + EXPIRY_SKEW >= at,
            None => false,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
}

// =============================================================================
// Regions and objects
// =============================================================================

/// Region entry as returned by the regions endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RegionEntry {
    Name(String),
    Object { name: String },
}

impl RegionEntry {
    pub fn into_name(self) -> String {
        match self {
            RegionEntry::Name(name) => name,
            RegionEntry::Object { name } => name,
        }
    }
}

/// Filter expression for the object search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectFilter {
    /// Every call-center recording in the AVAILABLE state.
    AllAvailable,
    /// One specific object.
    ById(String),
}

impl fmt::Display for ObjectFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectFilter::AllAvailable => {
                write!(f, "type==callcenterrecording,objectState==AVAILABLE")
            }
            ObjectFilter::ById(id) => write!(f, "id=={}", id),
        }
    }
}

/// A recording known to the storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteObject {
    pub id: String,
    /// Filled in by the locator; the API does not echo it back.
    #[serde(default)]
    pub region: String,
    #[serde(default, rename = "objectState")]
    pub state: Option<String>,
}

/// One page of object search results.
#[derive(Debug, Deserialize, Default)]
pub struct ObjectPage {
    #[serde(default)]
    pub content: Vec<RemoteObject>,
    pub last: Option<bool>,
    pub number: Option<u32>,
    #[serde(rename = "totalPages")]
    pub total_pages: Option<u32>,
}

impl ObjectPage {
    /// Index of the page that follows this one, if the server reports more.
    ///
    /// `requested` is the index this page was fetched with; the server's own
    /// `number` wins when present.
    pub fn next_page(&self, requested: Option<u32>) -> Option<u32> {
        let current = self.number.or(requested).unwrap_or(0);
        match (self.last, self.total_pages) {
            (Some(false), _) => Some(current + 1),
            (None, Some(total)) if current + 1 < total => Some(current + 1),
            _ => None,
        }
    }
}

// =============================================================================
// Bulk export
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct BulkStartResponse {
    #[serde(rename = "zipName")]
    pub zip_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkStatusResponse {
    pub status: Option<String>,
}

/// Status of a bulk export job as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Pending,
    InProgress,
    Done,
    Failed(String),
    Other(String),
}

impl ExportStatus {
    pub fn from_api(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "DONE" => ExportStatus::Done,
            "PENDING" => ExportStatus::Pending,
            "IN_PROGRESS" | "INPROGRESS" | "RUNNING" => ExportStatus::InProgress,
            "FAILED" | "ERROR" => ExportStatus::Failed(value.to_string()),
            _ => ExportStatus::Other(value.to_string()),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ExportStatus::Done)
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportStatus::Pending => write!(f, "PENDING"),
            ExportStatus::InProgress => write!(f, "IN_PROGRESS"),
            ExportStatus::Done => write!(f, "DONE"),
            ExportStatus::Failed(s) | ExportStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A bulk export job owned by the run that started it.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub region: String,
    pub archive_name: String,
    pub status: ExportStatus,
    /// Number of status checks issued so far.
    pub status_checks: u32,
}

impl ExportJob {
    pub fn new(region: impl Into<String>, archive_name: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            archive_name: archive_name.into(),
            status: ExportStatus::Pending,
            status_checks: 0,
        }
    }
}
