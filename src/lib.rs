//! Recordings Bridge Library
//!
//! Moves call-center recordings from the storage API into CRM leads. The
//! modules are exposed for the binaries and the integration tests.

pub mod archive;
pub mod config;
pub mod crm;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod server;
pub mod storage;

pub use error::SyncError;
pub use pipeline::{PipelineReport, RecordingPipeline, RecordingSelector};
pub use server::{run_server, RequestsLoggingLevel};
