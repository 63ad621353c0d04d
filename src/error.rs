//! Error types for the commit log.

use thiserror::Error;

/// Main error type for store and index operations.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index is empty")]
    EmptyIndex,

    #[error("Index is full: {size} of {capacity} bytes used")]
    IndexFull { size: u64, capacity: u64 },

    #[error("Store is full: {size} of {capacity} bytes used")]
    StoreFull { size: u64, capacity: u64 },

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation on a closed file")]
    Closed,

    #[error("Store failed after an append could not be rolled back")]
    Failed,
}

impl From<serde_json::Error> for LogError {
    fn from(e: serde_json::Error) -> Self {
        LogError::InvalidConfig(e.to_string())
    }
}

/// Result type for log operations.
pub type Result<T> = std::result::Result<T, LogError>;
