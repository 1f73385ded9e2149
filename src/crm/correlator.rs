//! Matches normalized recordings to CRM leads and uploads them.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::api::CrmApi;
use super::matching::MatchStrategy;
use super::models::Lead;
use crate::archive::NormalizedRecording;
use crate::error::SyncError;
use crate::pipeline::{FileOutcome, FileResult, PostProcessor, SkipReason};
use crate::server::metrics::record_file_outcome;

/// Outcomes of one batch. `error` is set when the batch stopped early,
/// either on cancellation or on the first failure in fail-fast mode.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub files: Vec<FileOutcome>,
    pub error: Option<SyncError>,
}

pub struct EntityCorrelator {
    crm: Arc<dyn CrmApi>,
    strategy: MatchStrategy,
    post_processor: Arc<dyn PostProcessor>,
    fail_fast: bool,
}

impl EntityCorrelator {
    pub fn new(
        crm: Arc<dyn CrmApi>,
        strategy: MatchStrategy,
        post_processor: Arc<dyn PostProcessor>,
        fail_fast: bool,
    ) -> Self {
        Self {
            crm,
            strategy,
            post_processor,
            fail_fast,
        }
    }

    pub fn set_post_processor(&mut self, post_processor: Arc<dyn PostProcessor>) {
        self.post_processor = post_processor;
    }

    /// Process every recording in order. A failing file does not stop the
    /// batch unless fail-fast is on.
    pub async fn process_batch(
        &self,
        recordings: &[NormalizedRecording],
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for recording in recordings {
            if cancel.is_cancelled() {
                outcome.error = Some(SyncError::Cancelled);
                break;
            }

            let result = match self.process_one(recording).await {
                Ok(result) => result,
                Err(err) => {
                    error!(
                        "Processing {} failed at {}: {}",
                        recording.file_name,
                        err.kind(),
                        err
                    );
                    let result = FileResult::failed(&err);
                    if self.fail_fast {
                        outcome.error = Some(err);
                    }
                    result
                }
            };

            record_file_outcome(result.label());
            outcome.files.push(FileOutcome {
                file_name: recording.file_name.clone(),
                original_name: recording.original_name.clone(),
                phone: recording.phone.clone(),
                result,
            });

            if outcome.error.is_some() {
                break;
            }
        }

        outcome
    }

    async fn process_one(&self, recording: &NormalizedRecording) -> Result<FileResult, SyncError> {
        let Some(phone) = recording.phone.as_deref() else {
            info!(
                "Skipping {}: no phone number in file name",
                recording.file_name
            );
            return Ok(FileResult::Skipped {
                reason: SkipReason::NoPhoneInName,
            });
        };

        let key = self.strategy.search_key(phone);
        let leads = self.crm.find_leads(&key).await?;
        let Some(lead) = self.select_lead(phone, leads) else {
            info!(
                "No lead matches {} ({} strategy), skipping {}",
                phone, self.strategy, recording.file_name
            );
            return Ok(FileResult::Skipped {
                reason: SkipReason::NoMatchingLead,
            });
        };

        let file_url = self
            .crm
            .upload_file(&recording.path, &recording.file_name)
            .await?;
        self.crm.attach_file(&lead.id, &file_url).await?;
        info!("Attached {} to lead {}", recording.file_name, lead.id);

        if let Some(comment) = self.post_processor.process(recording, &lead).await? {
            self.crm.add_comment(&lead.id, &comment).await?;
        }

        Ok(FileResult::Uploaded {
            lead_id: lead.id,
            file_url,
        })
    }

    /// First lead whose phone values match under the strategy. Leads that
    /// came back without phone values are trusted to match the search.
    fn select_lead(&self, phone: &str, leads: Vec<Lead>) -> Option<Lead> {
        let total = leads.len();
        let mut candidates = leads.into_iter().filter(|lead| {
            let mut values = lead.phone_values().peekable();
            values.peek().is_none() || values.any(|v| self.strategy.accepts(phone, v))
        });
        let first = candidates.next();
        let others = candidates.count();
        if first.is_some() && others > 0 {
            warn!(
                "{} leads match {}, using the first of {} returned",
                others + 1,
                phone,
                total
            );
        }
        first
    }
}
