//! Workspace-local JSON cache of the index.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::fingerprint::FileMetadata;
use crate::retrieval::index_state::Document;

/// Hidden directory under the workspace root holding the cache
pub const CACHE_DIR_NAME: &str = ".semindex";
pub const CACHE_FILE_NAME: &str = "index.json";
/// Bumped on any incompatible change to the cache layout
pub const SCHEMA_VERSION: u32 = 1;

/// On-disk form of an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedIndex {
    pub version: u32,
    /// Save time in epoch milliseconds
    pub timestamp: i64,
    pub file_metadata: HashMap<PathBuf, FileMetadata>,
    pub documents: Vec<Document>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedIndexRef<'a> {
    version: u32,
    timestamp: i64,
    file_metadata: &'a HashMap<PathBuf, FileMetadata>,
    documents: &'a [Document],
}

/// Handle on `<root>/.semindex/index.json`
#[derive(Debug, Clone)]
pub struct IndexCache {
    path: PathBuf,
}

impl IndexCache {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(CACHE_DIR_NAME).join(CACHE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the cache atomically: serialize into a temporary file next to the
    /// target, then rename it into place.
    pub async fn save(
        &self,
        file_metadata: &HashMap<PathBuf, FileMetadata>,
        documents: &[Document],
    ) -> Result<()> {
        let payload = serde_json::to_vec(&PersistedIndexRef {
            version: SCHEMA_VERSION,
            timestamp: chrono::Utc::now().timestamp_millis(),
            file_metadata,
            documents,
        })
        .context("Failed to serialize index cache")?;

        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<()> {
            let dir = path
                .parent()
                .context("Cache path has no parent directory")?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;

            let mut tmp = tempfile::NamedTempFile::new_in(dir)
                .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
            tmp.write_all(&payload)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path)
                .with_context(|| format!("Failed to move cache into {}", path.display()))?;
            Ok(())
        })
        .await
        .context("Cache writer task failed")
        .and_then(|inner| inner);

        match &result {
            Ok(()) => tracing::info!(
                "Saved index cache with {} documents to {}",
                documents.len(),
                self.path.display()
            ),
            Err(e) => tracing::error!("Failed to save index cache: {e:#}"),
        }
        result
    }

    /// Read the cache. Missing, unreadable, unparsable, or wrong-version files
    /// all come back as `None`.
    pub async fn load(&self) -> Option<PersistedIndex> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No index cache at {}", self.path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to read index cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        let persisted: PersistedIndex = match serde_json::from_slice(&bytes) {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::warn!("Ignoring corrupt index cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        if persisted.version != SCHEMA_VERSION {
            tracing::warn!(
                "Ignoring index cache with schema version {} (expected {})",
                persisted.version,
                SCHEMA_VERSION
            );
            return None;
        }

        tracing::debug!(
            "Loaded index cache with {} documents from {}",
            persisted.documents.len(),
            self.path.display()
        );
        Some(persisted)
    }

    /// Remove the cache file. Failures are logged, never returned.
    pub async fn delete(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::info!("Deleted index cache {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to delete index cache {}: {}", self.path.display(), e),
        }
    }
}
