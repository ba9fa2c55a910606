//! Offline feature-hashing embeddings.
//!
//! Each lower-cased identifier token is hashed with FNV into one of
//! `dimension` buckets with a hash-derived sign, and the bucket counts are
//! normalized. The vectors carry lexical rather than semantic similarity, but
//! they are deterministic, need no model or network, and keep the indexing
//! pipeline usable on air-gapped machines.

use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingResult, normalize_to_f16};
use async_trait::async_trait;
use fnv::FnvHasher;
use half::f16;
use std::hash::Hasher;

/// Deterministic bag-of-tokens embedding provider
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimension: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f16> {
        let mut buckets = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
        {
            let mut hasher = FnvHasher::default();
            hasher.write(token.to_lowercase().as_bytes());
            let hash = hasher.finish();
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            buckets[bucket] += sign;
        }
        normalize_to_f16(buckets)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(
            texts.iter().map(|text| self.embed_one(text)).collect(),
        ))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }
}
