//! Errors surfaced by the index manager.
//!
//! Most low-level failures never reach this type: unreadable files are
//! skipped, a broken cache is treated as a miss, and persistence failures are
//! logged. What remains is what a caller must see.

use semindex_embed::EmbedError;
use std::path::PathBuf;

pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The embedding provider failed permanently or ran out of retries
    #[error("Embedding provider failed: {0}")]
    Embedding(#[from] EmbedError),

    /// The operation was cancelled before the new index was assembled
    #[error("Indexing was cancelled")]
    Cancelled,

    /// Workspace enumeration could not run at all
    #[error("Failed to enumerate workspace {root}: {message}")]
    Enumeration { root: PathBuf, message: String },

    /// Writing the index cache failed
    #[error("Failed to persist index cache to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The manager was created without any workspace root
    #[error("No workspace roots configured")]
    NoWorkspace,
}

impl IndexError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
