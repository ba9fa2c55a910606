//! Index configuration.
//!
//! Settings are read from `<root>/.semindex.toml` when the file exists and
//! fall back to defaults otherwise. Every numeric option is clamped into its
//! supported range by [`IndexConfig::clamped`] before use.

use anyhow::{Context, Result};
use semindex_embed::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File name of the optional per-workspace configuration file
pub const CONFIG_FILE_NAME: &str = ".semindex.toml";

pub const DEFAULT_CHUNK_LINES: usize = 80;
pub const DEFAULT_CHUNK_OVERLAP_LINES: usize = 20;
pub const DEFAULT_TOP_K: usize = 6;
pub const MAX_FILE_CHARS: usize = 600_000;
pub const MAX_CHUNKS: usize = 2000;

/// Configuration for building and querying the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexConfig {
    /// Lines per chunk, clamped to [20, 400]
    pub chunk_lines: usize,
    /// Lines shared by consecutive chunks, clamped to [0, 200]
    pub chunk_overlap_lines: usize,
    /// Embedding model identifier; overrides `embed.modelName` when set
    pub embedding_model: Option<String>,
    /// Default number of results per query, clamped to [1, 20]
    pub top_k: usize,
    /// Files longer than this many characters are skipped
    pub max_file_chars: usize,
    /// Hard ceiling on the number of chunks in one index
    pub max_chunks: usize,
    /// Quiet period before a burst of file changes is re-indexed
    pub debounce_ms: u64,
    /// Honor `.gitignore` files during enumeration
    pub respect_gitignore: bool,
    /// Embedding provider settings
    pub embed: EmbedConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_lines: DEFAULT_CHUNK_LINES,
            chunk_overlap_lines: DEFAULT_CHUNK_OVERLAP_LINES,
            embedding_model: None,
            top_k: DEFAULT_TOP_K,
            max_file_chars: MAX_FILE_CHARS,
            max_chunks: MAX_CHUNKS,
            debounce_ms: 1000,
            respect_gitignore: true,
            embed: EmbedConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Load `<root>/.semindex.toml`, or defaults when it does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("Invalid config in {}", path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Copy of this configuration with every option inside its supported range.
    pub fn clamped(&self) -> Self {
        let mut config = self.clone();
        config.chunk_lines = config.chunk_lines.clamp(20, 400);
        config.chunk_overlap_lines = config.chunk_overlap_lines.clamp(0, 200);
        config.top_k = clamp_top_k(config.top_k);
        config.max_chunks = config.max_chunks.max(1);
        if let Some(model) = config.embedding_model.as_ref().filter(|m| !m.trim().is_empty()) {
            config.embed.model_name = model.clone();
        }
        config
    }

    pub fn with_chunk_lines(mut self, lines: usize) -> Self {
        self.chunk_lines = lines;
        self
    }

    pub fn with_chunk_overlap_lines(mut self, lines: usize) -> Self {
        self.chunk_overlap_lines = lines;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    pub fn with_embed_config(mut self, embed: EmbedConfig) -> Self {
        self.embed = embed;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Clamp a requested result count to [1, 20].
pub fn clamp_top_k(top_k: usize) -> usize {
    top_k.clamp(1, 20)
}
