//! Per-run, per-region and per-file results of a pipeline run.

use serde::Serialize;

use super::RecordingSelector;
use crate::error::SyncError;

/// Why a file was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The file name carries no `+<digits>` phone number.
    NoPhoneInName,
    /// The CRM has no lead for the phone number.
    NoMatchingLead,
}

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileResult {
    Uploaded { lead_id: String, file_url: String },
    Skipped { reason: SkipReason },
    Failed { stage: String, error: String },
}

impl FileResult {
    pub fn failed(err: &SyncError) -> Self {
        FileResult::Failed {
            stage: err.kind().to_string(),
            error: err.to_string(),
        }
    }

    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FileResult::Uploaded { .. } => "uploaded",
            FileResult::Skipped { .. } => "skipped",
            FileResult::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub file_name: String,
    pub original_name: String,
    pub phone: Option<String>,
    #[serde(flatten)]
    pub result: FileResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionError {
    pub kind: String,
    pub message: String,
}

impl From<&SyncError> for RegionError {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReport {
    pub region: String,
    pub objects_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_name: Option<String>,
    pub status_checks: u32,
    pub files: Vec<FileOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RegionError>,
}

impl RegionReport {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            objects_found: 0,
            archive_name: None,
            status_checks: 0,
            files: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub objects: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failed_regions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub selector: RecordingSelector,
    pub started_at: i64,
    pub finished_at: i64,
    pub regions: Vec<RegionReport>,
    pub totals: ReportTotals,
}

impl PipelineReport {
    pub fn new(run_id: impl Into<String>, selector: RecordingSelector, started_at: i64) -> Self {
        Self {
            run_id: run_id.into(),
            selector,
            started_at,
            finished_at: started_at,
            regions: Vec::new(),
            totals: ReportTotals::default(),
        }
    }

    pub fn push_region(&mut self, region: RegionReport) {
        self.totals.objects += region.objects_found;
        for file in &region.files {
            match file.result {
                FileResult::Uploaded { .. } => self.totals.uploaded += 1,
                FileResult::Skipped { .. } => self.totals.skipped += 1,
                FileResult::Failed { .. } => self.totals.failed += 1,
            }
        }
        if region.error.is_some() {
            self.totals.failed_regions += 1;
        }
        self.regions.push(region);
    }

    pub fn finish(&mut self, finished_at: i64) {
        self.finished_at = finished_at;
    }

    /// No region found anything to process.
    pub fn is_empty(&self) -> bool {
        self.totals.objects == 0 && self.totals.failed_regions == 0
    }

    pub fn has_failed_regions(&self) -> bool {
        self.totals.failed_regions > 0
    }

    /// First region error, for a one-line summary.
    pub fn first_error(&self) -> Option<&RegionError> {
        self.regions.iter().find_map(|r| r.error.as_ref())
    }
}
