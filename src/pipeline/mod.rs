//! Pipeline orchestration and run reports.

mod post_process;
mod region_locks;
mod report;
mod runner;

pub use post_process::{NoOpPostProcessor, PostProcessor};
pub use region_locks::RegionLocks;
pub use report::{
    FileOutcome, FileResult, PipelineReport, RegionError, RegionReport, ReportTotals, SkipReason,
};
pub use runner::{RecordingPipeline, RecordingSelector};
