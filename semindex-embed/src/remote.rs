//! OpenAI-compatible HTTP embedding provider.
//!
//! Sends `POST {endpoint}/embeddings` with `{"model", "input"}` and reads the
//! `data[].embedding` arrays back. Failures are classified here, once:
//! connection, DNS, timeout and request-level errors as well as HTTP 429 and
//! 5xx responses are [`EmbedError::Transient`]; any other non-success status
//! is a permanent [`EmbedError::Api`].

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, normalize_to_f16};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider backed by a remote HTTP API
#[derive(Debug)]
pub struct RemoteEmbeddingProvider {
    config: EmbedConfig,
    client: Client,
    api_key: Option<String>,
    dimension: AtomicUsize,
}

impl RemoteEmbeddingProvider {
    pub fn new(config: EmbedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(EmbedError::model_init)?;
        let api_key = config.api_key();
        if api_key.is_none() {
            tracing::warn!(
                "No API key found in ${}, sending unauthenticated requests",
                config.api_key_env
            );
        }
        Ok(Self {
            config,
            client,
            api_key,
            dimension: AtomicUsize::new(0),
        })
    }

    fn url(&self) -> String {
        format!("{}/embeddings", self.config.endpoint.trim_end_matches('/'))
    }

    fn classify_send_error(err: reqwest::Error) -> EmbedError {
        if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
            EmbedError::transient_from("embedding request failed to reach the provider", err)
        } else {
            EmbedError::External { source: err.into() }
        }
    }

    /// A connection dropped mid-body surfaces as a body or decode error.
    fn classify_body_error(err: reqwest::Error) -> EmbedError {
        if err.is_body() || err.is_decode() {
            EmbedError::transient_from("embedding response body could not be read", err)
        } else {
            Self::classify_send_error(err)
        }
    }

    fn classify_status(status: StatusCode, body: String) -> EmbedError {
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            EmbedError::transient(format!("provider returned {status}: {body}"))
        } else {
            EmbedError::Api {
                status: status.as_u16(),
                message: body,
            }
        }
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut request = self.client.post(self.url()).json(&EmbeddingRequest {
            model: &self.config.model_name,
            input: batch,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(Self::classify_send_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        let body = response.bytes().await.map_err(Self::classify_body_error)?;
        let mut parsed: EmbeddingResponse = serde_json::from_slice(&body)
            .map_err(|e| EmbedError::malformed(format!("invalid JSON body: {e}")))?;
        if parsed.data.len() != batch.len() {
            return Err(EmbedError::malformed(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|datum| datum.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            tracing::debug!("Requesting {} embeddings from {}", batch.len(), self.url());
            let vectors = self.embed_batch(batch).await?;
            all_embeddings.extend(vectors.into_iter().map(normalize_to_f16));
        }

        let result = EmbeddingResult::new(all_embeddings);
        self.dimension.store(result.dimension, Ordering::Relaxed);
        Ok(result)
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    fn provider_name(&self) -> &str {
        "remote"
    }
}
