//! Bulk export job lifecycle: start, then poll until DONE or out of budget.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::poll_policy::{PollPolicy, TimeoutAction};
use crate::error::SyncError;
use crate::server::metrics::record_export_status_checks;
use crate::storage::{AccessToken, ExportJob, ExportStatus, StorageApi};

/// Turns a set of object ids into a single downloadable archive.
pub struct ExportJobManager {
    storage: Arc<dyn StorageApi>,
    policy: PollPolicy,
}

impl ExportJobManager {
    pub fn new(storage: Arc<dyn StorageApi>, policy: PollPolicy) -> Self {
        Self { storage, policy }
    }

    /// Start a bulk export for `object_ids` in `region`.
    pub async fn start(
        &self,
        token: &AccessToken,
        region: &str,
        object_ids: &[String],
    ) -> Result<ExportJob, SyncError> {
        let archive_name = self
            .storage
            .start_bulk_download(token, region, object_ids)
            .await?;
        info!(
            "Started bulk export {} for {} objects in {} (waiting up to {:?})",
            archive_name,
            object_ids.len(),
            region,
            self.policy.max_wait()
        );
        Ok(ExportJob::new(region, archive_name))
    }

    /// Poll the job until it is DONE, failed, cancelled or out of budget.
    ///
    /// Issues at most `max_attempts` status checks and returns right after the
    /// first DONE. Budget exhaustion resolves according to the policy's
    /// [`TimeoutAction`].
    pub async fn await_completion(
        &self,
        token: &AccessToken,
        mut job: ExportJob,
        cancel: &CancellationToken,
    ) -> Result<ExportJob, SyncError> {
        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            job.status = self
                .storage
                .bulk_download_status(token, &job.region, &job.archive_name)
                .await?;
            job.status_checks += 1;
            debug!(
                "Bulk export {} status {} (check {}/{})",
                job.archive_name, job.status, job.status_checks, self.policy.max_attempts
            );

            match &job.status {
                ExportStatus::Done => {
                    record_export_status_checks(job.status_checks);
                    return Ok(job);
                }
                ExportStatus::Failed(status) => {
                    record_export_status_checks(job.status_checks);
                    return Err(SyncError::ExportFailed {
                        archive_name: job.archive_name.clone(),
                        status: status.clone(),
                    });
                }
                _ => {}
            }

            if !self.policy.should_poll_again(job.status_checks) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.policy.interval) => {}
                _ = cancel.cancelled() => {
                    info!("Stopped waiting for bulk export {}: cancelled", job.archive_name);
                    return Err(SyncError::Cancelled);
                }
            }
        }

        record_export_status_checks(job.status_checks);

        match self.policy.on_timeout {
            TimeoutAction::Abort => Err(SyncError::ExportTimeout {
                archive_name: job.archive_name.clone(),
                attempts: job.status_checks,
                last_status: job.status.to_string(),
            }),
            TimeoutAction::Proceed => {
                warn!(
                    "Bulk export {} still {} after {} checks, downloading anyway",
                    job.archive_name, job.status, job.status_checks
                );
                Ok(job)
            }
        }
    }
}
