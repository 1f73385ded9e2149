//! Bulk export job manager.
//!
//! Starts an asynchronous export on the storage API and waits for it with a
//! bounded, cancellable poll loop.

mod job_manager;
mod poll_policy;

pub use job_manager::ExportJobManager;
pub use poll_policy::{PollPolicy, TimeoutAction};
