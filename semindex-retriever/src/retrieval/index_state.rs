//! Core index data types: chunks, documents, the live index and its phase.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::vector_store::SimilarityStore;
use crate::storage::FileMetadata;

const FILE_URI_SCHEME: &str = "file://";

/// A contiguous, inclusive, 0-based line range of one file.
///
/// Identity is `(path, start_line0, end_line0)`. Chunks are never edited;
/// when their file changes they are dropped and replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub path: PathBuf,
    pub start_line0: usize,
    pub end_line0: usize,
    pub text: String,
}

impl CodeChunk {
    pub fn uri(&self) -> String {
        path_to_uri(&self.path)
    }

    pub fn to_document(&self) -> Document {
        Document {
            page_content: self.text.clone(),
            metadata: DocumentMetadata {
                uri: self.uri(),
                start_line0: self.start_line0,
                end_line0: self.end_line0,
            },
        }
    }
}

/// Location metadata stored alongside each document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub uri: String,
    pub start_line0: usize,
    pub end_line0: usize,
}

/// Provider-agnostic unit held by the similarity store and written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

/// Why a document could not be turned back into a chunk
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentParseError {
    #[error("document has an empty uri")]
    EmptyUri,
    #[error("document range {start}..={end} is inverted")]
    InvertedRange { start: usize, end: usize },
}

impl TryFrom<&Document> for CodeChunk {
    type Error = DocumentParseError;

    fn try_from(document: &Document) -> Result<Self, Self::Error> {
        let meta = &document.metadata;
        let raw = meta.uri.strip_prefix(FILE_URI_SCHEME).unwrap_or(&meta.uri);
        if raw.is_empty() {
            return Err(DocumentParseError::EmptyUri);
        }
        if meta.start_line0 > meta.end_line0 {
            return Err(DocumentParseError::InvertedRange {
                start: meta.start_line0,
                end: meta.end_line0,
            });
        }
        Ok(CodeChunk {
            path: PathBuf::from(raw),
            start_line0: meta.start_line0,
            end_line0: meta.end_line0,
            text: document.page_content.clone(),
        })
    }
}

pub fn path_to_uri(path: &Path) -> String {
    format!("{FILE_URI_SCHEME}{}", path.display())
}

/// Identify a set of workspace roots independent of their order.
pub fn workspace_key(roots: &[PathBuf]) -> String {
    let joined = roots
        .iter()
        .map(|root| root.to_string_lossy().into_owned())
        .sorted()
        .dedup()
        .join("\n");
    let hash = blake3::hash(joined.as_bytes());
    hex::encode(&hash.as_bytes()[..8])
}

/// Lifecycle phase of an index manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IndexPhase {
    /// No index has been built or loaded
    #[default]
    Empty,
    /// First build in progress, nothing to serve yet
    Building,
    /// A consistent index is available
    Ready,
    /// Full rebuild in progress; the previous index is still served
    Rebuilding,
    /// Changed files are being folded into the live index
    IncrementallyUpdating,
}

impl std::fmt::Display for IndexPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexPhase::Empty => write!(f, "empty"),
            IndexPhase::Building => write!(f, "building"),
            IndexPhase::Ready => write!(f, "ready"),
            IndexPhase::Rebuilding => write!(f, "rebuilding"),
            IndexPhase::IncrementallyUpdating => write!(f, "incrementally-updating"),
        }
    }
}

/// One complete, immutable index snapshot.
///
/// `chunks[i]` corresponds to `store.documents()[i]`; a snapshot is only
/// published once its store has been built from exactly these chunks.
#[derive(Clone)]
pub struct IndexState {
    pub store: Arc<dyn SimilarityStore>,
    pub chunks: Vec<CodeChunk>,
    pub workspace_key: String,
    pub file_metadata: HashMap<PathBuf, FileMetadata>,
}

impl std::fmt::Debug for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexState")
            .field("chunks", &self.chunks.len())
            .field("documents", &self.store.len())
            .field("workspace_key", &self.workspace_key)
            .field("files", &self.file_metadata.len())
            .finish()
    }
}

impl IndexState {
    pub fn documents(&self) -> &[Document] {
        self.store.documents()
    }

    /// Every chunk has exactly one matching document, in the same position.
    pub fn is_consistent(&self) -> bool {
        let documents = self.documents();
        documents.len() == self.chunks.len()
            && self.chunks.iter().zip(documents).all(|(chunk, doc)| {
                doc.metadata.uri == chunk.uri()
                    && doc.metadata.start_line0 == chunk.start_line0
                    && doc.metadata.end_line0 == chunk.end_line0
            })
    }

    pub fn chunks_for<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a CodeChunk> + 'a {
        self.chunks.iter().filter(move |chunk| chunk.path == path)
    }
}
