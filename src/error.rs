//! Error types for block traversal and streaming

use crate::types::TraversalOrder;
use thiserror::Error;

/// Main error type for traversal, pipeline and storage operations
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("Traversal order not supported: {0}")]
    UnsupportedOrder(TraversalOrder),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Traversal exhausted: no more blocks")]
    Exhausted,

    #[error("Pipeline closed by consumer")]
    PipelineClosed,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl BlockError {
    /// True for errors raised while setting up a traversal.
    ///
    /// These are never worth retrying: the same inputs fail the same way.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BlockError::InvalidArgument(_)
                | BlockError::GeometryMismatch(_)
                | BlockError::UnsupportedOrder(_)
                | BlockError::Configuration(_)
        )
    }
}

/// Specialized Result type for block operations
pub type Result<T> = std::result::Result<T, BlockError>;

impl From<serde_json::Error> for BlockError {
    fn from(err: serde_json::Error) -> Self {
        BlockError::Serialization(err.to_string())
    }
}
