//! semindex-retriever: line-range semantic index over a workspace
//!
//! This crate splits the text files of one or more workspace roots into
//! overlapping line windows, embeds them through [`semindex_embed`], and
//! answers natural-language queries with the most similar line ranges. The
//! index is cached on disk between runs and kept current from filesystem
//! change notifications.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: Index manager, chunking, enumeration, search and watching
//! - **[`storage`]**: On-disk index cache and file fingerprints
//! - **[`config`]**: Tunables loaded from `.semindex.toml`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use semindex_retriever::{IndexConfig, IndexManager, find_top_chunks};
//! use std::path::PathBuf;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let root = PathBuf::from(".");
//! let config = IndexConfig::load(&root)?;
//! let manager = IndexManager::from_config(vec![root], config).await?;
//!
//! let cancel = CancellationToken::new();
//! let index = manager.build_or_get_index(false, &cancel).await?;
//! for chunk in find_top_chunks(&index, "where is the retry policy", 6, &cancel).await? {
//!     println!("{}:{}-{}", chunk.path.display(), chunk.start_line0, chunk.end_line0);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! FileScanner → ChunkingStrategy → EmbeddingClient → MemoryVectorStore
//!      ↑                                                    ↓
//! DirectoryWatcher → ReindexDebouncer → IndexManager ⇄ IndexCache
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use config::IndexConfig;
pub use error::{IndexError, IndexResult};
pub use retrieval::debouncer::{ChangeSink, ReindexDebouncer};
pub use retrieval::directory_watcher::DirectoryWatcher;
pub use retrieval::index_manager::{IndexManager, IndexStats};
pub use retrieval::index_state::{CodeChunk, Document, IndexPhase, IndexState};
pub use retrieval::search::find_top_chunks;
