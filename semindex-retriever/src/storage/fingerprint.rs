//! Per-file change detection.

use chrono::{DateTime, Utc};
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::path::{Path, PathBuf};

/// Fingerprint of one indexed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_path: PathBuf,
    /// Modification time in milliseconds since the Unix epoch
    pub mtime: i64,
    pub content_hash: String,
}

impl FileMetadata {
    pub fn new(file_path: impl Into<PathBuf>, mtime: i64, content: &str) -> Self {
        Self {
            file_path: file_path.into(),
            mtime,
            content_hash: compute_content_hash(content),
        }
    }
}

/// FNV-1a 64-bit hash of `content`, as 16 hex digits.
///
/// Fast and stable across runs; not collision resistant, and not meant to be.
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = FnvHasher::default();
    hasher.write(content.as_bytes());
    format!("{:016x}", hasher.finish())
}

/// Modification time of `path` in epoch milliseconds.
pub async fn get_file_mtime(path: &Path) -> std::io::Result<i64> {
    let modified = tokio::fs::metadata(path).await?.modified()?;
    Ok(DateTime::<Utc>::from(modified).timestamp_millis())
}

/// A file is unchanged only when both its mtime and its content hash match.
/// A file with no previous fingerprint has always changed.
pub fn has_file_changed(previous: Option<&FileMetadata>, current: &FileMetadata) -> bool {
    match previous {
        Some(previous) => {
            previous.mtime != current.mtime || previous.content_hash != current.content_hash
        }
        None => true,
    }
}
