//! Persistence layer for semindex
//!
//! The similarity store itself is never written to disk. What is persisted is
//! enough to rebuild it: the raw documents plus one change-detection
//! fingerprint per indexed file.
//!
//! ## Key Components
//!
//! - **IndexCache**: Reads and writes the workspace-local cache file
//! - **PersistedIndex**: On-disk form of an index
//! - **FileMetadata**: Per-file fingerprint (mtime + content hash)
//!
//! ## Cache File
//!
//! ```text
//! <root>/.semindex/index.json
//! { "version": 1, "timestamp": <epoch ms>,
//!   "fileMetadata": { "<abs path>": { "filePath", "mtime", "contentHash" } },
//!   "documents": [ { "pageContent", "metadata": { "uri", "startLine0", "endLine0" } } ] }
//! ```
//!
//! A cache whose `version` differs from [`SCHEMA_VERSION`] is discarded, never
//! migrated.

pub mod fingerprint;
pub mod index_cache;

pub use fingerprint::{FileMetadata, compute_content_hash, get_file_mtime, has_file_changed};
pub use index_cache::{CACHE_DIR_NAME, CACHE_FILE_NAME, IndexCache, PersistedIndex, SCHEMA_VERSION};
