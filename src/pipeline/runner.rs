//! One pipeline run: token, regions, and for each region export, download,
//! normalize and correlate.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::post_process::{NoOpPostProcessor, PostProcessor};
use super::region_locks::RegionLocks;
use super::report::{PipelineReport, RegionError, RegionReport};
use crate::archive::{normalize_files, ArchiveMaterializer};
use crate::config::AppConfig;
use crate::crm::{CrmApi, EntityCorrelator};
use crate::error::SyncError;
use crate::export::{ExportJobManager, PollPolicy};
use crate::server::metrics::{record_pipeline_run, record_region_failure};
use crate::storage::{AccessToken, ObjectFilter, ObjectLocator, StorageApi};

/// Which recordings a run processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingSelector {
    /// Every available call-center recording.
    All,
    /// A single object by id.
    Object(String),
}

impl RecordingSelector {
    pub fn filter(&self) -> ObjectFilter {
        match self {
            RecordingSelector::All => ObjectFilter::AllAvailable,
            RecordingSelector::Object(id) => ObjectFilter::ById(id.clone()),
        }
    }

    /// Whether `id` can be embedded in a filter expression as-is.
    pub fn is_safe_object_id(id: &str) -> bool {
        !id.is_empty()
            && !id
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, ',' | ';' | '=' | '(' | ')'))
    }
}

impl fmt::Display for RecordingSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingSelector::All => write!(f, "all"),
            RecordingSelector::Object(id) => write!(f, "object {}", id),
        }
    }
}

pub struct RecordingPipeline {
    storage: Arc<dyn StorageApi>,
    locator: ObjectLocator,
    exports: ExportJobManager,
    materializer: ArchiveMaterializer,
    correlator: EntityCorrelator,
    locks: RegionLocks,
    retain_files: bool,
    cancel: CancellationToken,
}

impl RecordingPipeline {
    pub fn new(
        storage: Arc<dyn StorageApi>,
        crm: Arc<dyn CrmApi>,
        config: &AppConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            locator: ObjectLocator::new(storage.clone(), &config.storage),
            exports: ExportJobManager::new(storage.clone(), PollPolicy::new(&config.export)),
            materializer: ArchiveMaterializer::new(
                storage.clone(),
                config.pipeline.work_dir.clone(),
            ),
            correlator: EntityCorrelator::new(
                crm,
                config.crm.match_strategy,
                Arc::new(NoOpPostProcessor),
                config.pipeline.fail_fast,
            ),
            storage,
            locks: RegionLocks::new(),
            retain_files: config.pipeline.retain_files,
            cancel,
        }
    }

    /// Replace the default no-op post-processing stage.
    pub fn with_post_processor(mut self, post_processor: Arc<dyn PostProcessor>) -> Self {
        info!("Using post-processor {}", post_processor.name());
        self.correlator.set_post_processor(post_processor);
        self
    }

    pub fn work_dir(&self) -> PathBuf {
        self.materializer.work_dir().to_path_buf()
    }

    /// Run the pipeline once.
    ///
    /// Failures fetching the token or the region list fail the run. Anything
    /// that goes wrong inside a region is recorded on that region's report and
    /// the next region is processed.
    pub async fn run(&self, selector: RecordingSelector) -> Result<PipelineReport, SyncError> {
        let start = Instant::now();
        let result = self.run_inner(selector).await;

        let outcome = match &result {
            Ok(report) if report.has_failed_regions() => "partial",
            Ok(_) => "success",
            Err(SyncError::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        record_pipeline_run(outcome, start.elapsed());
        result
    }

    async fn run_inner(&self, selector: RecordingSelector) -> Result<PipelineReport, SyncError> {
        let run_id = Uuid::new_v4().to_string();
        let mut report = PipelineReport::new(
            run_id.clone(),
            selector.clone(),
            chrono::Utc::now().timestamp(),
        );
        info!("Starting run {} for {}", run_id, selector);
        let _run_dir = RunDirGuard::new(self.materializer.run_dir(&run_id), !self.retain_files);

        let mut token = self.storage.fetch_token().await.inspect_err(|e| {
            error!("Run {} could not authenticate: {}", run_id, e);
        })?;
        let regions = self.locator.regions(&token).await?;
        let filter = selector.filter();

        for region in regions {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let _guard = self.locks.lock(&region).await;

            if token.is_expired() {
                info!("Access token expired, fetching a new one");
                token = self.storage.fetch_token().await?;
            }

            let region_report = self.run_region(&run_id, &token, &region, &filter).await?;
            report.push_region(region_report);
        }

        report.finish(chrono::Utc::now().timestamp());
        info!(
            "Run {} finished: {} objects, {} uploaded, {} skipped, {} failed, {} failed regions",
            run_id,
            report.totals.objects,
            report.totals.uploaded,
            report.totals.skipped,
            report.totals.failed,
            report.totals.failed_regions
        );
        Ok(report)
    }

    /// Process one region. Only cancellation is returned as an error; every
    /// other failure ends up in the region report.
    async fn run_region(
        &self,
        run_id: &str,
        token: &AccessToken,
        region: &str,
        filter: &ObjectFilter,
    ) -> Result<RegionReport, SyncError> {
        let mut report = RegionReport::new(region);
        let result = self
            .process_region(run_id, token, region, filter, &mut report)
            .await;

        if !self.retain_files {
            if let Err(e) = self.materializer.cleanup_region(run_id, region).await {
                warn!("Failed to clean up files of {} in {}: {}", run_id, region, e);
            }
        }

        match result {
            Ok(()) => Ok(report),
            Err(SyncError::Cancelled) => Err(SyncError::Cancelled),
            Err(e) => {
                error!("Region {} failed: {}", region, e);
                record_region_failure(e.kind());
                report.error = Some(RegionError::from(&e));
                Ok(report)
            }
        }
    }

    async fn process_region(
        &self,
        run_id: &str,
        token: &AccessToken,
        region: &str,
        filter: &ObjectFilter,
        report: &mut RegionReport,
    ) -> Result<(), SyncError> {
        let objects = self.locator.find(token, region, filter).await?;
        report.objects_found = objects.len();
        if objects.is_empty() {
            info!("No recordings in {}", region);
            return Ok(());
        }

        let ids: Vec<String> = objects.into_iter().map(|o| o.id).collect();
        let job = self.exports.start(token, region, &ids).await?;
        report.archive_name = Some(job.archive_name.clone());

        let job = self.exports.await_completion(token, job, &self.cancel).await?;
        report.status_checks = job.status_checks;

        let archive = self
            .materializer
            .materialize(token, run_id, region, &job.archive_name)
            .await?;
        let recordings = normalize_files(&archive.audio_files)
            .await
            .map_err(|e| SyncError::Extraction(format!("Renaming extracted files failed: {}", e)))?;

        let batch = self.correlator.process_batch(&recordings, &self.cancel).await;
        report.files = batch.files;
        match batch.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Removes a run's working directory when dropped, including when the run
/// future is dropped before it completes.
struct RunDirGuard {
    path: PathBuf,
    enabled: bool,
}

impl RunDirGuard {
    fn new(path: PathBuf, enabled: bool) -> Self {
        Self { path, enabled }
    }
}

impl Drop for RunDirGuard {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed leftover run directory {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove run directory {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
