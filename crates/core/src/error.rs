//! Error types for factrag.
//!
//! One enum covers every failure category the pipeline distinguishes:
//! provider calls, the fact store, the vector index, boundary validation,
//! and the ambient configuration / prompt / I/O failures around them.

use thiserror::Error;

/// Unified error type for factrag.
///
/// All library functions return `Result<T, AppError>`. Whether a variant is
/// fatal or skippable depends on the operation that observed it (see the
/// indexer and retriever), not on the variant itself.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding or completion provider errors (network, auth, timeout, bad payload)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Fact store read/write errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Vector index errors
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Input rejected at the service boundary
    #[error("{0}")]
    Validation(String),

    /// The vector index returned no candidates for a query
    #[error("No data: {0}")]
    NoData(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error should be shown verbatim to an API caller.
    ///
    /// Only validation failures carry a caller-facing message; everything
    /// else is reported as a generic internal error.
    pub fn is_client_facing(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
