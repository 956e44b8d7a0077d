//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Storage Error ==
/// Failure reported by the underlying key-value store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend could not complete the operation (I/O, closed handle, ...)
    #[error("Storage backend failure: {0}")]
    Backend(String),

    /// The backend refused the write because it is out of space
    #[error("Storage quota exceeded")]
    QuotaExceeded,
}

// == Cache Error Enum ==
/// Unified error type for cache operations.
///
/// Only write paths and input validation produce these. Read paths degrade
/// to a miss instead of returning an error.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Underlying store operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Caller input rejected before any I/O
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Caller data could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
