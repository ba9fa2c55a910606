//! Retrying front door to an [`EmbeddingProvider`].

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, create_provider};
use crate::retry::{RetryPolicy, with_retry};
use half::f16;
use std::sync::Arc;

/// Embedding provider paired with the retry policy used for every call.
///
/// Both corpus embedding (similarity store construction) and query embedding
/// go through [`with_retry`], so a flaky network affects neither path more
/// than the policy allows.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("provider", &self.provider.provider_name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Build the configured provider and wrap it with the configured retry budget.
    pub async fn from_config(config: &EmbedConfig) -> Result<Self> {
        let provider = create_provider(config).await?;
        Ok(Self::new(provider, RetryPolicy::new(config.max_retries)))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Embed a corpus of texts, one vector per text, in input order.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }
        let result = with_retry(&self.policy, "embed documents", || {
            self.provider.embed_texts(texts)
        })
        .await?;
        if result.len() != texts.len() {
            return Err(EmbedError::malformed(format!(
                "provider returned {} embeddings for {} texts",
                result.len(),
                texts.len()
            )));
        }
        Ok(result)
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f16>> {
        with_retry(&self.policy, "embed query", || self.provider.embed_text(query)).await
    }
}
