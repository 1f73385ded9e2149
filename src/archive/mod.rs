//! Local side of a bulk export: download, expand, rename.

mod materializer;
mod normalizer;

pub use materializer::{is_supported_audio, ArchiveError, ArchiveMaterializer, MaterializedArchive};
pub use normalizer::{normalize_files, normalized_name, phone_from_name, NormalizedRecording};
