//! Error types for the embedding system

/// Result type for embedding operations.
///
/// Convenience alias over [`EmbedError`], used throughout the crate.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Every provider decides at its own boundary whether a failure is worth
/// retrying. Failures that may succeed on a second attempt (refused
/// connections, DNS failures, timeouts, throttling, overloaded servers) are
/// reported as [`EmbedError::Transient`]; everything else is permanent and is
/// surfaced to the caller on the first occurrence.
///
/// # Error Categories
///
/// - **Transient Errors**: Network-class failures, retried by [`crate::retry`]
/// - **Configuration Errors**: Invalid model settings or missing credentials
/// - **API Errors**: The provider answered but rejected the request
/// - **Runtime Errors**: Problems during actual embedding generation
/// - **External Errors**: Failures from dependencies
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Network-class failure that may succeed if retried
    #[error("Transient provider failure: {message}")]
    Transient {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The provider rejected the request (authentication, bad input, ...)
    #[error("Embedding API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The provider returned a response that does not match the request
    #[error("Malformed embedding response: {message}")]
    MalformedResponse { message: String },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Whether retrying the failed call could succeed.
    ///
    /// Only [`EmbedError::Transient`] qualifies. The classification is made
    /// once by the provider that produced the error, never by inspecting
    /// message text.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Create a transient error with a message and no underlying source.
    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transient error wrapping the failure that caused it.
    pub fn transient_from<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transient {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a model initialization error from any error type.
    pub fn model_init<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ModelInitialization {
            source: Box::new(source),
        }
    }

    /// Create an invalid configuration error with a custom message.
    ///
    /// # Arguments
    /// * `message` - A descriptive error message explaining what's wrong with the configuration
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_variant_is_retryable() {
        assert!(EmbedError::transient("connection refused").is_transient());
        assert!(
            EmbedError::transient_from(
                "timed out",
                std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout")
            )
            .is_transient()
        );

        assert!(
            !EmbedError::Api {
                status: 401,
                message: "unauthorized".to_string()
            }
            .is_transient()
        );
        assert!(!EmbedError::invalid_config("missing model").is_transient());
        assert!(!EmbedError::malformed("wrong count").is_transient());
        // Text that looks like a network failure is not reclassified
        assert!(!EmbedError::invalid_config("network timeout").is_transient());
    }
}
