//! Poll policy for bulk export jobs.
//!
//! Fixed interval between status checks with a bounded number of checks.

use crate::config::ExportSettings;
use std::time::Duration;

/// What to do when the status check budget runs out before the job is DONE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TimeoutAction {
    /// Fail the region with `ExportTimeout`.
    #[default]
    Abort,
    /// Download whatever the assigned archive name resolves to.
    Proceed,
}

#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Delay between two status checks.
    pub interval: Duration,
    /// Maximum number of status checks per job.
    pub max_attempts: u32,
    pub on_timeout: TimeoutAction,
}

impl PollPolicy {
    /// Create a new PollPolicy from configuration settings.
    pub fn new(config: &ExportSettings) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.max_poll_attempts.max(1),
            on_timeout: config.on_timeout,
        }
    }

    /// Whether another status check is allowed after `checks_made` checks.
    pub fn should_poll_again(&self, checks_made: u32) -> bool {
        checks_made < self.max_attempts
    }

    /// Longest time a job can spend sleeping between checks.
    ///
    /// There is no sleep after the last check, so this is
    /// `interval * (max_attempts - 1)`.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_attempts: 20,
            on_timeout: TimeoutAction::Abort,
        }
    }
}
