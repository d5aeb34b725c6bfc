//! Error types for the `adk-weaviate` crate.

use thiserror::Error;

/// Errors that can occur in vector store operations.
#[derive(Debug, Error)]
pub enum WeaviateError {
    /// Two vectors of different lengths were compared.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length of the reference vector (usually the query).
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// A vector-based operation was requested without a way to obtain vectors.
    #[error("Embedding required: {0}")]
    EmbeddingRequired(String),

    /// `delete` was called without any target ids.
    #[error("No ids provided to delete")]
    NoIdsProvided,

    /// The external vector database reported a failure.
    #[error("Service error ({operation}): {message}")]
    ServiceError {
        /// The service operation that failed.
        operation: String,
        /// The message reported by the service.
        message: String,
    },

    /// Construction-time misconfiguration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Call-time arguments that cannot be combined into a coherent request.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl WeaviateError {
    /// Build a [`WeaviateError::ServiceError`] for the given operation.
    pub fn service(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServiceError { operation: operation.into(), message: message.into() }
    }
}

/// A convenience result type for vector store operations.
pub type Result<T> = std::result::Result<T, WeaviateError>;
