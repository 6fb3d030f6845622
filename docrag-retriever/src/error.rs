//! Error taxonomy for ingestion, indexing and answering

use docrag_context::ChunkError;
use docrag_embed::EmbedError;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, RagError>;

/// Everything that can go wrong between a PDF on disk and an answer.
///
/// Most variants are fatal to one operation only. A document that fails to
/// extract or embed is skipped by ingestion; a failed question is reported to
/// whoever asked it. [`RagError::DimensionMismatch`] is the exception: it
/// means the embedding provider changed shape under a live index, and
/// ingestion stops until the configuration is fixed.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// The document could not be read or parsed
    #[error("Failed to extract pages from {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// An embedding or completion call failed
    #[error("Provider error: {0}")]
    Provider(#[from] EmbedError),

    /// A provider call ran past its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Search was attempted before anything was indexed
    #[error("The index is empty; ingest documents before asking questions")]
    EmptyIndex,

    /// A vector with zero (or non-finite) norm cannot be normalized
    #[error("Cannot normalize a zero vector")]
    ZeroVector,

    #[error("Index already initialized with dimension {existing}, refusing {requested}")]
    AlreadyInitialized { existing: usize, requested: usize },

    #[error("Index has not been initialized with a dimension")]
    NotInitialized,

    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Chunking failed: {0}")]
    Chunking(#[from] ChunkError),

    /// The configuration file could not be read or parsed
    #[error("Invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub fn extraction(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether this error should stop a whole ingestion batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }

    /// Whether this error came from a provider deadline, ours or theirs.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Provider(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Run one provider call with a deadline.
///
/// Expiry becomes [`RagError::Timeout`]; a provider failure becomes
/// [`RagError::Provider`]. Dropping the returned future cancels the call.
pub(crate) async fn bounded<T, F>(operation: &'static str, after: Duration, call: F) -> Result<T>
where
    F: Future<Output = docrag_embed::Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result.map_err(RagError::from),
        Err(_) => Err(RagError::Timeout { operation, after }),
    }
}
