//! Embedding provider implementations

use crate::config::{EmbedConfig, ProviderKind};
use crate::error::{EmbedError, Result};
use crate::hashing::HashingEmbeddingProvider;
use crate::remote::RemoteEmbeddingProvider;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use fnv::FnvHasher;
use half::f16;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, OnceLock};

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f16>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result from a vector of f16 embeddings.
    ///
    /// The dimension is inferred from the first embedding vector and defaults
    /// to 0 when there are none.
    pub fn new(embeddings: Vec<Vec<f16>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::malformed("No embedding generated for text"))
    }

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider, 0 if not yet known
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// Build the provider selected by `config`.
pub async fn create_provider(config: &EmbedConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::Remote => Arc::new(RemoteEmbeddingProvider::new(config.clone())?),
        ProviderKind::FastEmbed => Arc::new(FastEmbedProvider::create(config.clone()).await?),
        ProviderKind::Hashing => Arc::new(HashingEmbeddingProvider::new(config.hashing_dimension)),
    };
    tracing::info!(
        "Using {} embedding provider with model {}",
        provider.provider_name(),
        config.model_name
    );
    Ok(provider)
}

/// Convert an f32 vector to unit-length f16.
pub fn normalize_to_f16(embedding: Vec<f32>) -> Vec<f16> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    embedding
        .into_iter()
        .map(|value| {
            if norm > 0.0 {
                f16::from_f32(value / norm)
            } else {
                f16::from_f32(value)
            }
        })
        .collect()
}

/// Type alias for cached model entries (model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Global cache for initialized embedding models to avoid reloading
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> = OnceLock::new();

fn get_model_cache() -> &'static Mutex<HashMap<String, ModelCacheEntry>> {
    MODEL_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_poisoned<T>(_: T) -> EmbedError {
    EmbedError::invalid_config("fastembed model lock poisoned")
}

/// FastEmbed-based embedding provider running a local ONNX model
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Load (or reuse from the process-wide cache) the configured model.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let model_kind = Self::resolve_model(&config.model_name)?;
        let cache_key = Self::cache_key(&config.model_name);

        let cached = {
            let cache = get_model_cache().lock().map_err(lock_poisoned)?;
            cache
                .get(&cache_key)
                .map(|(model, dim)| (Arc::clone(model), *dim))
        };
        if let Some((model, dimension)) = cached {
            tracing::info!("Using cached model for: {}", config.model_name);
            return Ok(Self {
                config,
                model,
                dimension,
            });
        }

        let model_name = config.model_name.clone();
        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                tracing::info!("Loading embedding model: {}", model_name);

                let init_options =
                    InitOptions::new(model_kind).with_show_download_progress(false);
                let mut model = TextEmbedding::try_new(init_options)
                    .map_err(|e| EmbedError::External { source: e })?;

                // Probe the dimension with a throwaway embedding
                let probe = model
                    .embed(vec!["test".to_string()], None)
                    .map_err(|e| EmbedError::External { source: e })?;
                let dimension = probe.first().map(|emb| emb.len()).unwrap_or(0);
                if dimension == 0 {
                    return Err(EmbedError::malformed("model produced an empty embedding"));
                }

                tracing::info!("Model loaded successfully. Dimension: {}", dimension);
                Ok((model, dimension))
            })
            .await??;

        let model = Arc::new(Mutex::new(model));
        get_model_cache()
            .lock()
            .map_err(lock_poisoned)?
            .insert(cache_key, (Arc::clone(&model), dimension));

        Ok(Self {
            config,
            model,
            dimension,
        })
    }

    fn resolve_model(name: &str) -> Result<EmbeddingModel> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
                Ok(EmbeddingModel::AllMiniLML6V2)
            }
            "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "snowflake-arctic-embed-xs" | "snowflake/snowflake-arctic-embed-xs" => {
                Ok(EmbeddingModel::SnowflakeArcticEmbedXS)
            }
            other => Err(EmbedError::invalid_config(format!(
                "unsupported fastembed model '{other}'"
            ))),
        }
    }

    fn cache_key(model_name: &str) -> String {
        let mut hasher = FnvHasher::default();
        hasher.write(b"v1:");
        hasher.write(model_name.to_lowercase().as_bytes());
        format!("v1:{:x}", hasher.finish())
    }

    /// Clears the global model cache.
    pub fn clear_cache() {
        if let Ok(mut cache) = get_model_cache().lock() {
            cache.clear();
            tracing::info!("Model cache cleared");
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.config.batch_size.max(1)) {
            let chunk = chunk.to_vec();
            let model = Arc::clone(&self.model);

            let batch = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                let mut model_guard = model.lock().map_err(lock_poisoned)?;
                model_guard
                    .embed(chunk, None)
                    .map_err(|e| EmbedError::External { source: e })
            })
            .await??;

            all_embeddings.extend(batch.into_iter().map(normalize_to_f16));
        }

        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_result() {
        let embeddings = vec![
            vec![f16::from_f32(0.1), f16::from_f32(0.2), f16::from_f32(0.3)],
            vec![f16::from_f32(0.4), f16::from_f32(0.5), f16::from_f32(0.6)],
        ];
        let result = EmbeddingResult::new(embeddings);

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());
        assert_eq!(EmbeddingResult::new(vec![]).dimension, 0);
    }

    #[test]
    fn test_normalize_to_f16() {
        let normalized = normalize_to_f16(vec![3.0, 4.0]);
        assert!((normalized[0].to_f32() - 0.6).abs() < 1e-3);
        assert!((normalized[1].to_f32() - 0.8).abs() < 1e-3);

        // Zero vectors stay zero instead of becoming NaN
        let zero = normalize_to_f16(vec![0.0, 0.0]);
        assert!(zero.iter().all(|v| v.to_f32() == 0.0));
    }

    #[test]
    fn test_resolve_model_names() {
        assert!(FastEmbedProvider::resolve_model("all-MiniLM-L6-v2").is_ok());
        assert!(FastEmbedProvider::resolve_model("bge-small-en-v1.5").is_ok());
        assert!(FastEmbedProvider::resolve_model("gpt-5").is_err());
    }

    #[test]
    fn test_cache_key_generation() {
        let key1 = FastEmbedProvider::cache_key("all-minilm-l6-v2");
        let key2 = FastEmbedProvider::cache_key("ALL-MiniLM-L6-v2");
        let key3 = FastEmbedProvider::cache_key("bge-small-en-v1.5");

        assert_eq!(key1, key2, "Model names are case-insensitive");
        assert_ne!(key1, key3);
        assert!(key1.starts_with("v1:"));
    }

    #[tokio::test]
    async fn test_create_provider_selects_hashing() {
        let provider = create_provider(&EmbedConfig::hashing()).await.unwrap();
        assert_eq!(provider.provider_name(), "hashing");
        assert_eq!(provider.embedding_dimension(), 256);
    }

    #[tokio::test]
    async fn test_create_provider_rejects_invalid_config() {
        let config = EmbedConfig::hashing().with_batch_size(0);
        assert!(create_provider(&config).await.is_err());
    }

    #[tokio::test]
    #[ignore] // Downloads a real ONNX model - run with: cargo test -- --ignored
    async fn test_fastembed_download_and_embedding() -> Result<()> {
        let provider = FastEmbedProvider::create(EmbedConfig::fastembed_default()).await?;
        let result = provider
            .embed_texts(&[
                "fn add(a: i32, b: i32) -> i32".to_string(),
                "parse the configuration file".to_string(),
            ])
            .await?;

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, provider.embedding_dimension());
        assert!(result.embeddings[0].iter().all(|x| x.to_f32().is_finite()));

        FastEmbedProvider::clear_cache();
        Ok(())
    }
}
