//! Error types for the provider gateway

use std::time::Duration;

/// Result type for embedding and completion operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for every call made through an embedding or completion provider.
///
/// Callers mostly care about two things: whether the upstream provider failed
/// (network, HTTP status, malformed payload) and whether it failed by timing
/// out. [`EmbedError::is_timeout`] answers the second question regardless of
/// which layer noticed the deadline.
///
/// # Error Categories
///
/// - **Configuration Errors**: missing API keys, unknown models
/// - **Upstream Errors**: transport failures, non-2xx responses, bad payloads
/// - **Local Model Errors**: ONNX model loading and inference failures
/// - **Runtime Errors**: blocking task failures
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when provider configuration is invalid
    #[error("Invalid provider configuration: {message}")]
    InvalidConfig { message: String },

    /// The HTTP request could not be sent or its body could not be read
    #[error("Provider request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success status
    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// The provider answered but the payload was unusable
    #[error("Malformed provider response: {message}")]
    MalformedResponse { message: String },

    /// The call did not finish within its deadline
    #[error("Provider call timed out after {after:?}")]
    Timeout { after: Duration },

    /// Error during local model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: anyhow::Error,
    },

    /// Error during local embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: anyhow::Error,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl EmbedError {
    /// Create a model initialization error.
    pub fn model_init(source: impl Into<anyhow::Error>) -> Self {
        Self::ModelInitialization {
            source: source.into(),
        }
    }

    /// Create an embedding generation error.
    pub fn embedding_gen(source: impl Into<anyhow::Error>) -> Self {
        Self::EmbeddingGeneration {
            source: source.into(),
        }
    }

    /// Classify a transport error from a client whose deadline is `after`.
    pub(crate) fn from_request(source: reqwest::Error, after: Duration) -> Self {
        if source.is_timeout() {
            Self::Timeout { after }
        } else if source.is_decode() {
            Self::malformed(source.to_string())
        } else {
            Self::Request { source }
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed response error with a custom message.
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Whether this error means the provider did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        let err = EmbedError::Timeout {
            after: Duration::from_secs(5),
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("5s"));

        assert!(!EmbedError::malformed("missing vector").is_timeout());
        assert!(!EmbedError::model_init(anyhow::anyhow!("no onnx file")).is_timeout());
        assert!(!EmbedError::invalid_config("no key").is_timeout());
    }

    #[test]
    fn test_status_message() {
        let err = EmbedError::Status {
            provider: "openai".to_string(),
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "openai returned 429: rate limited");
    }
}

