//! Renames extracted recordings to the caller's phone number.
//!
//! Provider file names look like `agent_2024-01-01+15551234567_abc.mp3`. The
//! first `+<digits>` run is the phone number; everything else is dropped.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use super::materializer::numbered_name;

lazy_static! {
    static ref PHONE_PATTERN: Regex =
        Regex::new(r"\+(\d+)").expect("Failed to compile phone pattern");
}

/// An extracted recording after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecording {
    #[serde(skip)]
    pub path: PathBuf,
    pub original_name: String,
    pub file_name: String,
    /// `+<digits>`, or `None` when the original name carries no phone number.
    pub phone: Option<String>,
}

/// The `+<digits>` phone key embedded in `name`, if any.
pub fn phone_from_name(name: &str) -> Option<String> {
    PHONE_PATTERN
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|digits| format!("+{}", digits.as_str()))
}

/// Canonical file name for `name`: `+<digits>.<ext>`, or `None` when no phone
/// number is present.
pub fn normalized_name(name: &str) -> Option<String> {
    let phone = phone_from_name(name)?;
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) => Some(format!("{}.{}", phone, ext)),
        None => Some(phone),
    }
}

/// Renames every file in `files` in place.
///
/// Files without a phone number keep their name. When the canonical name is
/// already taken by another file, a `-<n>` suffix is added instead of
/// overwriting it. Running this twice yields the same names.
pub async fn normalize_files(files: &[PathBuf]) -> std::io::Result<Vec<NormalizedRecording>> {
    let mut normalized = Vec::with_capacity(files.len());

    for path in files {
        let Some(original_name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!("Skipping non UTF-8 file name {}", path.display());
            continue;
        };
        let original_name = original_name.to_string();

        let Some(target_name) = normalized_name(&original_name) else {
            debug!("No phone number in {}, leaving it as is", original_name);
            normalized.push(NormalizedRecording {
                path: path.clone(),
                original_name: original_name.clone(),
                file_name: original_name,
                phone: None,
            });
            continue;
        };

        let target_path = free_target(path, &target_name).await?;
        if target_path != *path {
            tokio::fs::rename(path, &target_path).await?;
            debug!(
                "Renamed {} to {}",
                original_name,
                target_path.display()
            );
        }

        let file_name = target_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&target_name)
            .to_string();
        normalized.push(NormalizedRecording {
            path: target_path,
            original_name,
            phone: phone_from_name(&file_name),
            file_name,
        });
    }

    Ok(normalized)
}

/// First of `target`, `target-2`, `target-3`, ... in the directory of `source`
/// that is either free or already `source` itself.
async fn free_target(source: &Path, target_name: &str) -> std::io::Result<PathBuf> {
    let dir = source.parent().unwrap_or_else(|| Path::new("."));

    // An already normalized name, possibly disambiguated, stays put.
    if let Some(current) = source.file_name().and_then(|n| n.to_str()) {
        if is_variant_of(current, target_name) {
            return Ok(source.to_path_buf());
        }
    }

    let mut candidate = dir.join(target_name);
    let mut n = 2;
    while tokio::fs::try_exists(&candidate).await? {
        candidate = dir.join(numbered_name(target_name, n));
        n += 1;
    }
    Ok(candidate)
}

fn is_variant_of(current: &str, target_name: &str) -> bool {
    if current == target_name {
        return true;
    }
    let target = Path::new(target_name);
    let stem = target.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let ext = target.extension().and_then(|e| e.to_str());
    let current_path = Path::new(current);
    if current_path.extension().and_then(|e| e.to_str()) != ext {
        return false;
    }
    current_path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix(stem))
        .and_then(|rest| rest.strip_prefix('-'))
        .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
