//! # semindex-embed
//!
//! Embedding providers for the semindex workspace index, plus the retrying
//! client every embedding call goes through.
//!
//! ## Providers
//!
//! - [`RemoteEmbeddingProvider`]: OpenAI-compatible HTTP endpoint
//! - [`FastEmbedProvider`]: local ONNX model via fastembed
//! - [`HashingEmbeddingProvider`]: offline feature hashing, no model needed
//!
//! ## Quick Start
//!
//! ```no_run
//! use semindex_embed::{EmbedConfig, EmbeddingClient};
//!
//! # async fn example() -> semindex_embed::Result<()> {
//! let client = EmbeddingClient::from_config(&EmbedConfig::hashing()).await?;
//! let vectors = client
//!     .embed_documents(&["fn main() {}".to_string()])
//!     .await?;
//! println!("{} vectors of dimension {}", vectors.len(), vectors.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Providers classify every failure once, at their own boundary, as either
//! [`EmbedError::Transient`] or a permanent variant. [`with_retry`] retries
//! only the former, backing off 1s, 2s, 4s, ... between attempts.
//!
//! Vectors are returned as unit-length half-precision (`f16`) values.

pub mod client;
pub mod config;
pub mod error;
pub mod hashing;
pub mod provider;
pub mod remote;
pub mod retry;

// Re-export main types for easy access
pub use client::EmbeddingClient;
pub use config::{EmbedConfig, ProviderKind};
pub use error::{EmbedError, Result};
pub use hashing::HashingEmbeddingProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider, create_provider};
pub use remote::RemoteEmbeddingProvider;
pub use retry::{RetryPolicy, with_retry};
