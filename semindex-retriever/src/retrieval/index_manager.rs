//! Index lifecycle orchestration.
//!
//! [`IndexManager`] owns the index for one set of workspace roots and is the
//! only writer of it. It decides between reusing the live index, hydrating
//! from the on-disk cache, and rebuilding from scratch, and it folds changed
//! files into the live index.
//!
//! ## State Machine
//!
//! ```text
//! Empty ──build──▶ Building ──▶ Ready ──force──▶ Rebuilding ──▶ Ready
//!                                 │
//!                                 └──changes──▶ IncrementallyUpdating ──▶ Ready
//! ```
//!
//! Every transition that produces a new index assembles it off to the side
//! and publishes it only after its similarity store was built successfully,
//! so a failed rebuild never replaces a good index and readers always see a
//! snapshot where chunks and documents line up.
//!
//! Full rebuilds and incremental updates are serialized by a per-manager
//! writer lock; readers never take it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use semindex_embed::EmbeddingClient;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::chunking_strategy::{ChunkingConfig, ChunkingStrategy};
use super::debouncer::ChangeSink;
use super::file_scanner::FileScanner;
use super::index_state::{CodeChunk, IndexPhase, IndexState, workspace_key};
use super::vector_store::{MemoryVectorStore, SimilarityStore};
use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::storage::{FileMetadata, IndexCache, get_file_mtime, has_file_changed};

/// Outcome of reading one candidate file
enum FileRead {
    Content { text: String, fingerprint: FileMetadata },
    Missing,
    Skipped(String),
}

/// Snapshot of the manager for status displays
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub phase: IndexPhase,
    pub workspace_key: String,
    pub roots: Vec<PathBuf>,
    pub chunks: usize,
    pub documents: usize,
    pub files: usize,
    pub cache_path: PathBuf,
    pub cache_exists: bool,
}

/// Owner of the live index for one workspace
pub struct IndexManager {
    roots: Vec<PathBuf>,
    workspace_key: String,
    config: IndexConfig,
    client: EmbeddingClient,
    strategy: ChunkingStrategy,
    scanner: FileScanner,
    cache: IndexCache,
    state: RwLock<Option<Arc<IndexState>>>,
    phase: watch::Sender<IndexPhase>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("roots", &self.roots)
            .field("workspace_key", &self.workspace_key)
            .field("phase", &self.phase())
            .finish()
    }
}

impl IndexManager {
    /// Create a manager for `roots`. The first root holds the cache file.
    ///
    /// Nothing is read or embedded until [`build_or_get_index`](Self::build_or_get_index)
    /// is called.
    pub fn new(
        roots: Vec<PathBuf>,
        config: IndexConfig,
        client: EmbeddingClient,
    ) -> IndexResult<Self> {
        let roots: Vec<PathBuf> = roots
            .into_iter()
            .map(|root| std::path::absolute(&root).unwrap_or(root))
            .collect();
        let primary = roots.first().cloned().ok_or(IndexError::NoWorkspace)?;

        let config = config.clamped();
        let strategy = ChunkingStrategy::new(ChunkingConfig::from(&config));
        let scanner = FileScanner::new(roots.clone(), config.respect_gitignore, strategy.clone());
        let workspace_key = workspace_key(&roots);
        info!(
            "Index manager for {} root(s), workspace key {}",
            roots.len(),
            workspace_key
        );

        Ok(Self {
            cache: IndexCache::new(&primary),
            roots,
            workspace_key,
            config,
            client,
            strategy,
            scanner,
            state: RwLock::new(None),
            phase: watch::Sender::new(IndexPhase::Empty),
            writer: Mutex::new(()),
        })
    }

    /// Create a manager whose embedding client is built from `config.embed`.
    pub async fn from_config(roots: Vec<PathBuf>, config: IndexConfig) -> IndexResult<Self> {
        let config = config.clamped();
        let client = EmbeddingClient::from_config(&config.embed).await?;
        Self::new(roots, config, client)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn workspace_key(&self) -> &str {
        &self.workspace_key
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    pub fn phase(&self) -> IndexPhase {
        *self.phase.borrow()
    }

    /// The live index, if one has been built or loaded.
    pub async fn current(&self) -> Option<Arc<IndexState>> {
        self.state.read().await.clone()
    }

    pub async fn stats(&self) -> IndexStats {
        let state = self.current().await;
        IndexStats {
            phase: self.phase(),
            workspace_key: self.workspace_key.clone(),
            roots: self.roots.clone(),
            chunks: state.as_ref().map_or(0, |s| s.chunks.len()),
            documents: state.as_ref().map_or(0, |s| s.store.len()),
            files: state.as_ref().map_or(0, |s| s.file_metadata.len()),
            cache_path: self.cache.path().to_path_buf(),
            cache_exists: self.cache.exists(),
        }
    }

    /// Return a usable index, building one if necessary.
    ///
    /// Unless `force` is set, a live index for this workspace is returned
    /// as-is, and otherwise the on-disk cache is tried before a full rebuild.
    /// Problems with the cache only cause a fallback to the rebuild. A
    /// provider failure during the rebuild is returned, and the previous index
    /// (if any) stays live.
    pub async fn build_or_get_index(
        &self,
        force: bool,
        cancel: &CancellationToken,
    ) -> IndexResult<Arc<IndexState>> {
        if !force {
            if let Some(state) = self.live_for_workspace().await {
                debug!("Reusing live index ({} chunks)", state.chunks.len());
                return Ok(state);
            }
        }

        let _writer = self.writer.lock().await;

        // Another caller may have finished a build while we waited
        if !force {
            if let Some(state) = self.live_for_workspace().await {
                return Ok(state);
            }
        }

        let previous = self.current().await;
        self.phase.send_replace(if previous.is_some() {
            IndexPhase::Rebuilding
        } else {
            IndexPhase::Building
        });

        let result = self.load_or_rebuild(force, cancel).await;
        match &result {
            Ok(state) => {
                *self.state.write().await = Some(Arc::clone(state));
                self.phase.send_replace(IndexPhase::Ready);
            }
            Err(e) => {
                warn!("Index build failed: {}", e);
                self.phase.send_replace(if previous.is_some() {
                    IndexPhase::Ready
                } else {
                    IndexPhase::Empty
                });
            }
        }
        result
    }

    async fn live_for_workspace(&self) -> Option<Arc<IndexState>> {
        self.current()
            .await
            .filter(|state| state.workspace_key == self.workspace_key)
    }

    async fn load_or_rebuild(
        &self,
        force: bool,
        cancel: &CancellationToken,
    ) -> IndexResult<Arc<IndexState>> {
        if !force && self.cache.exists() {
            match self.hydrate(cancel).await {
                Ok(Some(state)) => return Ok(state),
                Ok(None) => info!("Index cache unusable, rebuilding"),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => warn!("Failed to restore index from cache, rebuilding: {}", e),
            }
        }
        self.full_rebuild(cancel).await
    }

    /// Rebuild the store from cached documents, refreshing files that changed
    /// on disk since the cache was written.
    async fn hydrate(&self, cancel: &CancellationToken) -> IndexResult<Option<Arc<IndexState>>> {
        let Some(persisted) = self.cache.load().await else {
            return Ok(None);
        };

        let mut chunks: Vec<CodeChunk> = match persisted
            .documents
            .iter()
            .map(CodeChunk::try_from)
            .collect::<Result<_, _>>()
        {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Index cache holds an invalid document: {}", e);
                return Ok(None);
            }
        };
        let mut file_metadata = persisted.file_metadata;

        let tracked: Vec<PathBuf> = file_metadata.keys().cloned().collect();
        let refreshed = self
            .refresh_files(&mut chunks, &mut file_metadata, &tracked, cancel)
            .await;
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        if refreshed > 0 {
            info!("{} file(s) changed since the cache was written", refreshed);
            self.enforce_chunk_cap(&mut chunks, &mut file_metadata);
        }

        let state = self.assemble(chunks, file_metadata).await?;
        info!(
            "Restored index from cache: {} chunks from {} files",
            state.chunks.len(),
            state.file_metadata.len()
        );
        if refreshed > 0 {
            self.persist(&state).await;
        }
        Ok(Some(state))
    }

    async fn full_rebuild(&self, cancel: &CancellationToken) -> IndexResult<Arc<IndexState>> {
        info!("Starting full index rebuild");
        let files = self.scanner.scan(cancel).await?;
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let max_chunks = self.config.max_chunks;
        let mut chunks: Vec<CodeChunk> = Vec::new();
        let mut file_metadata = HashMap::new();
        let mut skipped = 0usize;

        for path in files {
            if cancel.is_cancelled() {
                info!("Full rebuild cancelled after {} files", file_metadata.len());
                return Err(IndexError::Cancelled);
            }

            match self.read_indexable(&path).await {
                FileRead::Content { text, fingerprint } => {
                    let mut file_chunks = self.strategy.chunk_content(&path, &text);
                    let remaining = max_chunks - chunks.len();
                    if file_chunks.len() > remaining {
                        warn!(
                            "Chunk limit of {} reached at {}, remaining files are not indexed",
                            max_chunks,
                            path.display()
                        );
                        file_chunks.truncate(remaining);
                    }
                    chunks.extend(file_chunks);
                    file_metadata.insert(path, fingerprint);
                }
                FileRead::Missing => debug!("File vanished during rebuild: {}", path.display()),
                FileRead::Skipped(reason) => {
                    debug!("Skipping {}: {}", path.display(), reason);
                    skipped += 1;
                }
            }

            if chunks.len() >= max_chunks {
                break;
            }
        }

        info!(
            "Chunked {} files into {} chunks ({} skipped)",
            file_metadata.len(),
            chunks.len(),
            skipped
        );

        let state = self.assemble(chunks, file_metadata).await?;
        self.persist(&state).await;
        Ok(state)
    }

    /// Fold changed files into the live index.
    ///
    /// Does nothing when no index is live. For every path, its old chunks are
    /// dropped; files that still exist are re-read and re-chunked, deleted
    /// ones lose their fingerprint. Unreadable files are skipped. The store is
    /// then rebuilt from the complete chunk list and the cache rewritten.
    ///
    /// Returns the number of files whose chunks changed.
    pub async fn incremental_reindex(&self, changed_paths: &[PathBuf]) -> IndexResult<usize> {
        if changed_paths.is_empty() {
            return Ok(0);
        }
        if self.current().await.is_none() {
            debug!("No live index, ignoring {} changed path(s)", changed_paths.len());
            return Ok(0);
        }

        let _writer = self.writer.lock().await;
        let Some(current) = self.current().await else {
            return Ok(0);
        };

        self.phase.send_replace(IndexPhase::IncrementallyUpdating);
        let result = self.apply_changes(&current, changed_paths).await;
        self.phase.send_replace(IndexPhase::Ready);

        match result {
            Ok(Some((state, refreshed))) => {
                info!(
                    "Incremental reindex of {} file(s) done, {} chunks live",
                    refreshed,
                    state.chunks.len()
                );
                *self.state.write().await = Some(state);
                Ok(refreshed)
            }
            Ok(None) => Ok(0),
            Err(e) => {
                warn!("Incremental reindex failed, keeping previous index: {}", e);
                Err(e)
            }
        }
    }

    async fn apply_changes(
        &self,
        current: &IndexState,
        changed_paths: &[PathBuf],
    ) -> IndexResult<Option<(Arc<IndexState>, usize)>> {
        let paths = self.expand_changed_paths(changed_paths, current).await;

        let mut chunks = current.chunks.clone();
        let mut file_metadata = current.file_metadata.clone();
        let refreshed = self
            .refresh_files(&mut chunks, &mut file_metadata, &paths, &CancellationToken::new())
            .await;
        if refreshed == 0 {
            debug!("No indexed content changed, keeping the current store");
            return Ok(None);
        }
        self.enforce_chunk_cap(&mut chunks, &mut file_metadata);

        let state = self.assemble(chunks, file_metadata).await?;
        self.persist(&state).await;
        Ok(Some((state, refreshed)))
    }

    /// Files affected by a batch of change notifications, sorted.
    ///
    /// A directory or a vanished path stands for every tracked file below it,
    /// plus whatever indexable files the disk now holds there. Renaming a
    /// directory is reported as just the old and new directory paths.
    async fn expand_changed_paths(
        &self,
        changed_paths: &[PathBuf],
        current: &IndexState,
    ) -> Vec<PathBuf> {
        let mut expanded = BTreeSet::new();
        for path in changed_paths.iter().map(|path| self.resolve(path)) {
            expanded.extend(
                current
                    .file_metadata
                    .keys()
                    .chain(current.chunks.iter().map(|chunk| &chunk.path))
                    .filter(|tracked| tracked.starts_with(&path))
                    .cloned(),
            );

            let is_dir = tokio::fs::metadata(&path)
                .await
                .is_ok_and(|metadata| metadata.is_dir());
            if !is_dir {
                expanded.insert(path);
                continue;
            }
            match self.scanner.scan_within(&path, &CancellationToken::new()).await {
                Ok(files) => expanded.extend(files),
                Err(e) => warn!("Failed to enumerate changed directory {}: {}", path.display(), e),
            }
        }
        expanded.into_iter().collect()
    }

    /// Bring the chunks and fingerprints of `paths` in line with the disk.
    /// Returns how many files actually changed.
    async fn refresh_files(
        &self,
        chunks: &mut Vec<CodeChunk>,
        file_metadata: &mut HashMap<PathBuf, FileMetadata>,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> usize {
        let mut refreshed = 0;
        for path in paths {
            if cancel.is_cancelled() {
                break;
            }

            match self.read_indexable(path).await {
                FileRead::Content { text, fingerprint } => {
                    if file_metadata.contains_key(path)
                        && !has_file_changed(file_metadata.get(path), &fingerprint)
                    {
                        debug!("Unchanged: {}", path.display());
                        continue;
                    }
                    chunks.retain(|chunk| &chunk.path != path);
                    chunks.extend(self.strategy.chunk_content(path, &text));
                    file_metadata.insert(path.clone(), fingerprint);
                    refreshed += 1;
                }
                FileRead::Missing | FileRead::Skipped(_) => {
                    let before = chunks.len();
                    chunks.retain(|chunk| &chunk.path != path);
                    let had_metadata = file_metadata.remove(path).is_some();
                    if had_metadata || chunks.len() != before {
                        debug!("Dropped {} from the index", path.display());
                        refreshed += 1;
                    }
                }
            }
        }
        refreshed
    }

    /// Put chunks back in enumeration order (by path, windows in file order)
    /// and truncate to the configured ceiling, forgetting files that lost all
    /// of their chunks. The result matches what a full rebuild would keep.
    fn enforce_chunk_cap(
        &self,
        chunks: &mut Vec<CodeChunk>,
        file_metadata: &mut HashMap<PathBuf, FileMetadata>,
    ) {
        chunks.sort_by(|a, b| a.path.cmp(&b.path));
        let max_chunks = self.config.max_chunks;
        if chunks.len() <= max_chunks {
            return;
        }
        warn!(
            "Index holds {} chunks, truncating to {}",
            chunks.len(),
            max_chunks
        );
        let dropped: HashSet<PathBuf> = chunks
            .drain(max_chunks..)
            .map(|chunk| chunk.path)
            .collect();
        let kept: HashSet<&Path> = chunks.iter().map(|chunk| chunk.path.as_path()).collect();
        for path in dropped {
            if !kept.contains(path.as_path()) {
                file_metadata.remove(&path);
            }
        }
    }

    async fn read_indexable(&self, path: &Path) -> FileRead {
        if !self.scanner.accepts(path) {
            return FileRead::Skipped("excluded path or binary extension".to_string());
        }

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return FileRead::Missing,
            Err(e) => return FileRead::Skipped(e.to_string()),
        };
        if !metadata.is_file() {
            return FileRead::Skipped("not a regular file".to_string());
        }

        let mtime = match get_file_mtime(path).await {
            Ok(mtime) => mtime,
            Err(e) => return FileRead::Skipped(e.to_string()),
        };
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return FileRead::Missing,
            Err(e) => return FileRead::Skipped(e.to_string()),
        };
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => return FileRead::Skipped("not valid UTF-8".to_string()),
        };

        let max_chars = self.config.max_file_chars;
        if text.len() > max_chars && text.chars().count() > max_chars {
            return FileRead::Skipped(format!("longer than {max_chars} characters"));
        }

        let fingerprint = FileMetadata::new(path, mtime, &text);
        FileRead::Content { text, fingerprint }
    }

    /// Embed `chunks` into a fresh store and wrap everything in a new snapshot.
    async fn assemble(
        &self,
        chunks: Vec<CodeChunk>,
        file_metadata: HashMap<PathBuf, FileMetadata>,
    ) -> IndexResult<Arc<IndexState>> {
        let documents = chunks.iter().map(CodeChunk::to_document).collect();
        let store = MemoryVectorStore::from_documents(documents, self.client.clone()).await?;
        let store: Arc<dyn SimilarityStore> = Arc::new(store);

        Ok(Arc::new(IndexState {
            store,
            chunks,
            workspace_key: self.workspace_key.clone(),
            file_metadata,
        }))
    }

    async fn persist(&self, state: &IndexState) {
        if let Err(source) = self.cache.save(&state.file_metadata, state.documents()).await {
            let error = IndexError::Persistence {
                path: self.cache.path().to_path_buf(),
                source,
            };
            warn!("Index is usable but was not persisted: {}", error);
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.roots[0].join(path)
        }
    }

    /// Drop the live index and delete the cache file.
    pub async fn clear(&self) {
        let _writer = self.writer.lock().await;
        *self.state.write().await = None;
        self.phase.send_replace(IndexPhase::Empty);
        self.cache.delete().await;
        info!("Index cleared");
    }
}

#[async_trait]
impl ChangeSink for IndexManager {
    async fn files_changed(&self, paths: Vec<PathBuf>) {
        if let Err(e) = self.incremental_reindex(&paths).await {
            tracing::error!("Failed to reindex {} changed file(s): {}", paths.len(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semindex_embed::{HashingEmbeddingProvider, RetryPolicy};
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn manager(root: &Path, config: IndexConfig) -> IndexManager {
        let client =
            EmbeddingClient::new(Arc::new(HashingEmbeddingProvider::new(64)), RetryPolicy::new(1));
        IndexManager::new(vec![root.to_path_buf()], config, client).unwrap()
    }

    fn numbered_lines(count: usize) -> String {
        (0..count).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_requires_a_root() {
        let client =
            EmbeddingClient::new(Arc::new(HashingEmbeddingProvider::new(8)), RetryPolicy::new(1));
        let result = IndexManager::new(vec![], IndexConfig::default(), client);
        assert!(matches!(result, Err(IndexError::NoWorkspace)));
    }

    #[tokio::test]
    async fn test_phase_moves_from_empty_to_ready() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("a.rs"), "fn a() {}")?;
        let manager = manager(dir.path(), IndexConfig::default());
        assert_eq!(manager.phase(), IndexPhase::Empty);

        let state = manager
            .build_or_get_index(false, &CancellationToken::new())
            .await?;
        assert_eq!(manager.phase(), IndexPhase::Ready);
        assert!(state.is_consistent());
        assert_eq!(state.chunks.len(), 1);

        manager.clear().await;
        assert_eq!(manager.phase(), IndexPhase::Empty);
        assert!(manager.current().await.is_none());
        assert!(!manager.cache().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_chunk_cap_truncates_tail() -> anyhow::Result<()> {
        let dir = tempdir()?;
        // Each file yields 3 chunks with 20-line windows and no overlap
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(dir.path().join(name), numbered_lines(60))?;
        }
        let config = IndexConfig::default()
            .with_chunk_lines(20)
            .with_chunk_overlap_lines(0)
            .with_max_chunks(4);
        let manager = manager(dir.path(), config);

        let state = manager
            .build_or_get_index(false, &CancellationToken::new())
            .await?;
        assert_eq!(state.chunks.len(), 4);
        assert!(state.is_consistent());
        // c.txt was never reached
        assert_eq!(state.file_metadata.len(), 2);
        assert!(!state.file_metadata.contains_key(&dir.path().join("c.txt")));
        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_and_non_utf8_files_are_skipped() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("ok.rs"), "fn ok() {}")?;
        std::fs::write(dir.path().join("huge.txt"), "x".repeat(600_001))?;
        std::fs::write(dir.path().join("latin1.txt"), [0x66, 0xe9, 0x0a])?;
        let manager = manager(dir.path(), IndexConfig::default());

        let state = manager
            .build_or_get_index(false, &CancellationToken::new())
            .await?;
        let files: Vec<_> = state.file_metadata.keys().cloned().collect();
        assert_eq!(files, vec![dir.path().join("ok.rs")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_build_keeps_manager_empty() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("a.rs"), "fn a() {}")?;
        let manager = manager(dir.path(), IndexConfig::default());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = manager.build_or_get_index(false, &cancel).await;

        assert!(matches!(result, Err(IndexError::Cancelled)));
        assert_eq!(manager.phase(), IndexPhase::Empty);
        assert!(!manager.cache().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_incremental_without_live_index_is_noop() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn a() {}")?;
        let manager = manager(dir.path(), IndexConfig::default());

        assert_eq!(manager.incremental_reindex(&[path]).await?, 0);
        assert!(manager.current().await.is_none());
        assert!(!manager.cache().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_unchanged_files_do_not_rebuild_store() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn a() {}")?;
        let manager = manager(dir.path(), IndexConfig::default());
        let before = manager
            .build_or_get_index(false, &CancellationToken::new())
            .await?;

        assert_eq!(manager.incremental_reindex(&[path]).await?, 0);
        let after = manager.current().await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        Ok(())
    }

    #[tokio::test]
    async fn test_relative_paths_resolve_against_first_root() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("a.rs"), "fn a() {}")?;
        let manager = manager(dir.path(), IndexConfig::default());
        manager
            .build_or_get_index(false, &CancellationToken::new())
            .await?;

        std::fs::write(dir.path().join("b.rs"), "fn b() {}")?;
        assert_eq!(manager.incremental_reindex(&[PathBuf::from("b.rs")]).await?, 1);
        let state = manager.current().await.unwrap();
        assert!(state.file_metadata.contains_key(&dir.path().join("b.rs")));
        Ok(())
    }

    #[tokio::test]
    async fn test_edited_file_keeps_its_place_under_chunk_cap() -> anyhow::Result<()> {
        let dir = tempdir()?;
        // Two 20-line windows per file, so the cap admits a.txt and b.txt only
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(dir.path().join(name), numbered_lines(40))?;
        }
        let config = IndexConfig::default()
            .with_chunk_lines(20)
            .with_chunk_overlap_lines(0)
            .with_max_chunks(4);
        let manager = manager(dir.path(), config);
        manager
            .build_or_get_index(false, &CancellationToken::new())
            .await?;

        let a = dir.path().join("a.txt");
        std::fs::write(&a, numbered_lines(60))?;
        assert_eq!(manager.incremental_reindex(&[a.clone()]).await?, 1);

        let state = manager.current().await.unwrap();
        assert!(state.is_consistent());
        assert_eq!(state.chunks_for(&a).count(), 3);
        assert_eq!(state.chunks_for(&dir.path().join("b.txt")).count(), 1);
        let mut files: Vec<_> = state.file_metadata.keys().cloned().collect();
        files.sort();
        assert_eq!(files, vec![a, dir.path().join("b.txt")]);
        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_unwritable_cache_still_serves_the_index() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("a.rs"), "fn a() {}")?;
        // A plain file where the cache directory belongs
        std::fs::write(dir.path().join(".semindex"), "not a directory")?;
        let manager = manager(dir.path(), IndexConfig::default());

        let state = manager
            .build_or_get_index(false, &CancellationToken::new())
            .await?;
        assert!(state.is_consistent());
        assert!(state.file_metadata.contains_key(&dir.path().join("a.rs")));
        assert_eq!(manager.phase(), IndexPhase::Ready);
        assert!(manager.current().await.is_some());
        assert!(!manager.cache().exists());
        assert!(logs_contain("not persisted"));
        Ok(())
    }
}
