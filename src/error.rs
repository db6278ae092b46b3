//! Error types for spool
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using SpoolError
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Unified error type for spool operations
#[derive(Debug, Error)]
pub enum SpoolError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // File Format Errors
    // -------------------------------------------------------------------------
    #[error("Header mismatch: {0}")]
    HeaderMismatch(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Codec error: {0}")]
    Codec(String),

    // -------------------------------------------------------------------------
    // Buffer Errors
    // -------------------------------------------------------------------------
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Index {index} out of bounds (available: {available})")]
    IndexOutOfBounds { index: u64, available: u64 },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for SpoolError {
    fn from(err: bincode::Error) -> Self {
        SpoolError::Codec(err.to_string())
    }
}
