//! Downloads bulk export archives and expands their audio entries.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::storage::{AccessToken, StorageApi};

/// Errors raised while expanding a downloaded archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Not a zip archive: {0}")]
    NotAZip(String),

    #[error("Zip extraction error: {0}")]
    ZipError(String),
}

impl From<ArchiveError> for SyncError {
    fn from(err: ArchiveError) -> Self {
        SyncError::Extraction(err.to_string())
    }
}

/// Audio extensions kept from an archive.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav"];

/// A downloaded archive and the audio files expanded from it.
#[derive(Debug, Clone)]
pub struct MaterializedArchive {
    pub archive_path: PathBuf,
    pub extract_dir: PathBuf,
    pub size_bytes: u64,
    pub audio_files: Vec<PathBuf>,
}

/// Turns an export archive name into audio files on local disk.
///
/// Every run works below `{work_dir}/{run_id}/{region}/`, so two runs that
/// resolve the same archive name never share a directory.
pub struct ArchiveMaterializer {
    storage: Arc<dyn StorageApi>,
    work_dir: PathBuf,
}

impl ArchiveMaterializer {
    pub fn new(storage: Arc<dyn StorageApi>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.work_dir.join(run_id)
    }

    pub fn region_dir(&self, run_id: &str, region: &str) -> PathBuf {
        self.run_dir(run_id).join(sanitize_component(region))
    }

    /// Download `archive_name` from `region` and expand it.
    pub async fn materialize(
        &self,
        token: &AccessToken,
        run_id: &str,
        region: &str,
        archive_name: &str,
    ) -> Result<MaterializedArchive, SyncError> {
        let region_dir = self.region_dir(run_id, region);
        fs::create_dir_all(&region_dir).await?;

        let local_name = sanitize_filename(archive_name)
            .map_err(|e| SyncError::Download(e.to_string()))?;
        let archive_path = region_dir.join(&local_name);

        let size_bytes = self
            .storage
            .download_archive(token, region, archive_name, &archive_path)
            .await?;
        info!(
            "Downloaded {} from {} ({:#})",
            archive_name,
            region,
            byte_unit::Byte::from(size_bytes)
        );

        check_zip_signature(&archive_path).await?;

        let stem = Path::new(&local_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("archive")
            .to_string();
        let extract_dir = region_dir.join(stem);
        let audio_files = extract_audio(archive_path.clone(), extract_dir.clone()).await?;
        info!(
            "Extracted {} audio files from {}",
            audio_files.len(),
            archive_name
        );

        Ok(MaterializedArchive {
            archive_path,
            extract_dir,
            size_bytes,
            audio_files,
        })
    }

    /// Remove everything a run left for `region`, and the run directory once
    /// no region is left in it.
    pub async fn cleanup_region(&self, run_id: &str, region: &str) -> Result<(), SyncError> {
        let region_dir = self.region_dir(run_id, region);
        if fs::try_exists(&region_dir).await? {
            fs::remove_dir_all(&region_dir).await?;
            debug!("Removed {}", region_dir.display());
        }
        // Other regions of the same run may still be in there.
        let _ = fs::remove_dir(self.run_dir(run_id)).await;
        Ok(())
    }
}

/// Whether `filename` has one of the recognized audio extensions.
pub fn is_supported_audio(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// `name` with `-<n>` inserted before the extension.
pub fn numbered_name(name: &str, n: usize) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}-{}.{}", stem, n, ext),
        None => format!("{}-{}", stem, n),
    }
}

async fn check_zip_signature(path: &Path) -> Result<(), ArchiveError> {
    let mut header = [0u8; 8];
    let mut file = fs::File::open(path).await?;
    let mut read = 0;
    while read < header.len() {
        let n = file.read(&mut header[read..]).await?;
        if n == 0 {
            break;
        }
        read += n;
    }
    if !infer::archive::is_zip(&header[..read]) {
        return Err(ArchiveError::NotAZip(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ));
    }
    Ok(())
}

async fn extract_audio(
    archive_path: PathBuf,
    extract_dir: PathBuf,
) -> Result<Vec<PathBuf>, ArchiveError> {
    tokio::task::spawn_blocking(move || extract_audio_blocking(&archive_path, &extract_dir))
        .await
        .map_err(|e| ArchiveError::ZipError(format!("extraction task failed: {}", e)))?
}

fn extract_audio_blocking(
    archive_path: &Path,
    extract_dir: &Path,
) -> Result<Vec<PathBuf>, ArchiveError> {
    std::fs::create_dir_all(extract_dir)?;

    let reader = BufReader::new(File::open(archive_path)?);
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| ArchiveError::ZipError(e.to_string()))?;

    let mut taken: HashSet<String> = HashSet::new();
    let mut audio_files = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ArchiveError::ZipError(e.to_string()))?;

        if entry.is_dir() {
            continue;
        }
        let entry_name = entry.name().to_string();
        if !is_supported_audio(&entry_name) {
            debug!("Skipping non-audio entry {}", entry_name);
            continue;
        }

        let safe_name = match sanitize_filename(&entry_name) {
            Ok(name) => name,
            Err(e) => {
                warn!("Skipping archive entry: {}", e);
                continue;
            }
        };
        let unique_name = claim_name(&mut taken, safe_name);
        let output_path = extract_dir.join(&unique_name);

        let mut output = File::create(&output_path)?;
        std::io::copy(&mut entry, &mut output)
            .map_err(|e| ArchiveError::ZipError(e.to_string()))?;
        audio_files.push(output_path);
    }

    Ok(audio_files)
}

/// Reserve `name` in `taken`, falling back to `-2`, `-3`, ... suffixes.
fn claim_name(taken: &mut HashSet<String>, name: String) -> String {
    if taken.insert(name.to_lowercase()) {
        return name;
    }
    let mut n = 2;
    loop {
        let candidate = numbered_name(&name, n);
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

/// Reduce an archive entry name to a safe single path component.
fn sanitize_filename(filename: &str) -> Result<String, ArchiveError> {
    // zip entries always use '/', but some producers emit '\'
    let last = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    if last.is_empty() || last.contains('\0') || last.starts_with('.') {
        return Err(ArchiveError::InvalidFilename(filename.to_string()));
    }

    let sanitized = sanitize_component(last);
    if sanitized.is_empty() {
        return Err(ArchiveError::InvalidFilename(filename.to_string()));
    }
    Ok(sanitized)
}

/// A single path component; never empty, `.` or `..`.
fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            _ => c,
        })
        .collect();
    if sanitized.trim().chars().all(|c| c == '.') {
        format!("_{}", sanitized.replace('.', "_"))
    } else {
        sanitized
    }
}
