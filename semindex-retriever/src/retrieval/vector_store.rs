//! In-memory similarity store over embedded documents.
//!
//! The store is built in one shot from a complete document set and has no
//! insert or delete operation; callers rebuild it whenever the document set
//! changes.

use async_trait::async_trait;
use half::f16;
use semindex_embed::{EmbeddingClient, Result};

use super::index_state::Document;

/// One query match, best matches first
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document: Document,
    pub score: f32,
}

/// Nearest-neighbor search over a fixed set of documents.
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Documents in insertion order
    fn documents(&self) -> &[Document];

    fn len(&self) -> usize {
        self.documents().len()
    }

    fn is_empty(&self) -> bool {
        self.documents().is_empty()
    }

    /// The `k` documents closest to `query`, best first.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

/// Brute-force cosine similarity over f16 vectors held in memory
pub struct MemoryVectorStore {
    documents: Vec<Document>,
    vectors: Vec<Vec<f16>>,
    client: EmbeddingClient,
}

impl std::fmt::Debug for MemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVectorStore")
            .field("documents", &self.documents.len())
            .field("client", &self.client)
            .finish()
    }
}

impl MemoryVectorStore {
    /// Embed every document through the retrying client and build the store.
    pub async fn from_documents(documents: Vec<Document>, client: EmbeddingClient) -> Result<Self> {
        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        tracing::debug!(
            "Embedding {} documents with {}",
            texts.len(),
            client.provider_name()
        );
        let embedded = client.embed_documents(&texts).await?;
        Ok(Self {
            documents,
            vectors: embedded.embeddings,
            client,
        })
    }
}

#[async_trait]
impl SimilarityStore for MemoryVectorStore {
    fn documents(&self) -> &[Document] {
        &self.documents
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.documents.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.client.embed_query(query).await?;

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, vector)| (i, cosine_similarity(&query_vector, vector)))
            .collect();
        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                document: self.documents[i].clone(),
                score,
            })
            .collect())
    }
}

pub(crate) fn cosine_similarity(a: &[f16], b: &[f16]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (x.to_f32(), y.to_f32());
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::index_state::DocumentMetadata;
    use semindex_embed::{HashingEmbeddingProvider, RetryPolicy};
    use std::sync::Arc;

    fn client() -> EmbeddingClient {
        EmbeddingClient::new(Arc::new(HashingEmbeddingProvider::new(256)), RetryPolicy::new(1))
    }

    fn doc(text: &str, start: usize) -> Document {
        Document {
            page_content: text.to_string(),
            metadata: DocumentMetadata {
                uri: "file:///w/a.rs".to_string(),
                start_line0: start,
                end_line0: start + 1,
            },
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = [f16::from_f32(1.0), f16::from_f32(0.0)];
        let b = [f16::from_f32(0.0), f16::from_f32(1.0)];
        let c = [f16::from_f32(-1.0), f16::from_f32(0.0)];
        assert_eq!(cosine_similarity(&a, &a), 1.0);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&a, &c), -1.0);
        // Mismatched or zero vectors score zero
        assert_eq!(cosine_similarity(&a, &[f16::ONE]), 0.0);
        assert_eq!(cosine_similarity(&a, &[f16::ZERO, f16::ZERO]), 0.0);
    }

    #[tokio::test]
    async fn test_search_ranks_best_first() {
        let store = MemoryVectorStore::from_documents(
            vec![
                doc("render sidebar widget layout", 0),
                doc("parse json config file from disk", 2),
                doc("json config defaults", 4),
            ],
            client(),
        )
        .await
        .unwrap();

        assert_eq!(store.len(), 3);
        let hits = store.similarity_search("parse json config file", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.metadata.start_line0, 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let store = MemoryVectorStore::from_documents(vec![], client()).await.unwrap();
        assert!(store.is_empty());
        assert!(store.similarity_search("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_k_larger_than_corpus() {
        let store = MemoryVectorStore::from_documents(vec![doc("one", 0)], client())
            .await
            .unwrap();
        assert_eq!(store.similarity_search("one", 10).await.unwrap().len(), 1);
    }
}
