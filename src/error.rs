//! Error types for the LSH retrieval pipeline

use thiserror::Error;

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, LshError>;

/// Error types that can occur while building or querying an index
#[derive(Error, Debug)]
pub enum LshError {
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Index has not been built")]
    NotBuilt,

    #[error("Index is stale: built at store generation {built}, store is at {current}")]
    StaleIndex { built: u64, current: u64 },

    #[error("Unknown id: {id}")]
    UnknownId { id: String },

    #[error("Query {query} retrieved no candidates, precision is undefined")]
    EmptyResult { query: String },

    #[error("Ground truth for {query} is empty, recall is undefined")]
    EmptyGroundTruth { query: String },

    #[error("Query cancelled")]
    Cancelled,

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LshError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        LshError::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether the error belongs to a single query and a batch may continue past it.
    pub fn is_per_query(&self) -> bool {
        matches!(
            self,
            LshError::UnknownId { .. }
                | LshError::EmptyResult { .. }
                | LshError::EmptyGroundTruth { .. }
                | LshError::DimensionMismatch { .. }
                | LshError::InvalidVector { .. }
                | LshError::Cancelled
        )
    }
}
