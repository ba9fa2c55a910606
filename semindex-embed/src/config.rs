//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible HTTP endpoint
    #[default]
    Remote,
    /// Local ONNX model run through fastembed
    FastEmbed,
    /// Offline feature hashing, no model required
    Hashing,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Remote => write!(f, "remote"),
            ProviderKind::FastEmbed => write!(f, "fastembed"),
            ProviderKind::Hashing => write!(f, "hashing"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote" | "http" | "openai" => Ok(ProviderKind::Remote),
            "fastembed" | "local" | "onnx" => Ok(ProviderKind::FastEmbed),
            "hashing" | "offline" => Ok(ProviderKind::Hashing),
            _ => Err(format!(
                "Invalid provider: '{s}'. Valid values are: remote, fastembed, hashing"
            )),
        }
    }
}

/// Configuration for embedding generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbedConfig {
    /// Backend that produces the vectors
    pub provider: ProviderKind,
    /// Model identifier passed to the provider
    pub model_name: String,
    /// Base URL of the remote provider, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    /// Name of the environment variable holding the remote API key
    pub api_key_env: String,
    /// Maximum number of texts per provider call
    pub batch_size: usize,
    /// Per-request timeout for remote calls, in seconds
    pub request_timeout_secs: u64,
    /// Total attempts for one embedding call before giving up
    pub max_retries: u32,
    /// Dimension used by the hashing provider
    pub hashing_dimension: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Remote,
            model_name: "text-embedding-3-small".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key_env: "SEMINDEX_API_KEY".to_string(),
            batch_size: 64,
            request_timeout_secs: 30,
            max_retries: 3,
            hashing_dimension: 256,
        }
    }
}

impl EmbedConfig {
    /// Create a configuration for the given provider and model, other settings default.
    pub fn new(provider: ProviderKind, model_name: impl Into<String>) -> Self {
        Self {
            provider,
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Configuration for the offline hashing provider.
    pub fn hashing() -> Self {
        Self::new(ProviderKind::Hashing, "feature-hashing")
    }

    /// Configuration for the bundled fastembed model.
    pub fn fastembed_default() -> Self {
        Self::new(ProviderKind::FastEmbed, "all-minilm-l6-v2").with_batch_size(16)
    }

    /// Set the remote endpoint (builder style)
    pub fn with_endpoint<S: Into<String>>(self, endpoint: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..self
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set the retry budget (builder style)
    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    /// Per-request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Check the settings that every provider relies on.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(EmbedError::invalid_config("model name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch size must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(EmbedError::invalid_config("max retries must be at least 1"));
        }
        if self.provider == ProviderKind::Remote && self.endpoint.trim().is_empty() {
            return Err(EmbedError::invalid_config(
                "remote provider requires an endpoint",
            ));
        }
        if self.provider == ProviderKind::Hashing && self.hashing_dimension == 0 {
            return Err(EmbedError::invalid_config(
                "hashing dimension must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbedConfig::default();
        assert_eq!(config.provider, ProviderKind::Remote);
        assert_eq!(config.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        assert!(EmbedConfig::default().with_batch_size(0).validate().is_err());
        assert!(EmbedConfig::default().with_max_retries(0).validate().is_err());
        assert!(EmbedConfig::default().with_endpoint("  ").validate().is_err());
        assert!(EmbedConfig::hashing().with_endpoint("").validate().is_ok());
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!(
            "FastEmbed".parse::<ProviderKind>().unwrap(),
            ProviderKind::FastEmbed
        );
        assert_eq!(
            "offline".parse::<ProviderKind>().unwrap(),
            ProviderKind::Hashing
        );
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::Remote);
        assert!("bogus".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::Hashing.to_string(), "hashing");
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: EmbedConfig =
            serde_json::from_str(r#"{"provider":"hashing","hashingDimension":64}"#).unwrap();
        assert_eq!(config.provider, ProviderKind::Hashing);
        assert_eq!(config.hashing_dimension, 64);
        assert_eq!(config.batch_size, 64);
    }
}
