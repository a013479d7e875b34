//! Error handling for GeneBank tree operations.
//!
//! Every fallible public API returns [`Result<T>`], an alias over
//! [`GeneBankError`]. All variants are fatal to the operation that produced
//! them; the storage layer never retries.

use std::io;
use thiserror::Error;

/// Result type for GeneBank operations.
pub type Result<T> = std::result::Result<T, GeneBankError>;

/// Errors that can occur while building or querying a tree file.
#[derive(Debug, Error)]
pub enum GeneBankError {
    /// I/O error from the underlying file.
    ///
    /// Raised when the tree file cannot be opened, read, written or synced.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A decoded header or node record failed a structural check.
    ///
    /// Examples are an offset pointing outside the file, an entry count
    /// larger than the node capacity, or keys stored out of order.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// Tree construction parameters are unusable.
    ///
    /// The tree order must lie in `3..=65535` and, when caching is
    /// requested, the cache capacity must lie in `1..=1 << 20`.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An argument to an operation is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl GeneBankError {
    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        GeneBankError::Corruption(msg.into())
    }

    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        GeneBankError::InvalidConfiguration(msg.into())
    }

    pub(crate) fn invalid_arg(msg: impl Into<String>) -> Self {
        GeneBankError::InvalidArgument(msg.into())
    }
}
