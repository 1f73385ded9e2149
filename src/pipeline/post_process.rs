use async_trait::async_trait;

use crate::archive::NormalizedRecording;
use crate::crm::Lead;
use crate::error::SyncError;

/// Optional stage run after a recording has been attached to its lead.
///
/// A returned comment is posted to the lead timeline.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &str;

    async fn process(
        &self,
        recording: &NormalizedRecording,
        lead: &Lead,
    ) -> Result<Option<String>, SyncError>;
}

/// Does nothing. The default hook.
pub struct NoOpPostProcessor;

#[async_trait]
impl PostProcessor for NoOpPostProcessor {
    fn name(&self) -> &str {
        "noop"
    }

    async fn process(
        &self,
        _recording: &NormalizedRecording,
        _lead: &Lead,
    ) -> Result<Option<String>, SyncError> {
        Ok(None)
    }
}
