//! Error types for the rest timer.
//!
//! Nothing here is fatal to an instance: validation errors are handed back to
//! the caller, read errors degrade to defaults and write errors leave the local
//! projection updated.

use thiserror::Error;

/// Errors raised by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading a key failed at the backend
    #[error("Failed to read '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing a key failed at the backend
    #[error("Failed to write '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Stored data could not be decoded
    #[error("Corrupt data under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Backend refused the operation
    #[error("Store unavailable for '{key}'")]
    Unavailable { key: String },

    /// Record could not be encoded for storage
    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// Filesystem watcher could not be installed
    #[error("Failed to watch store: {0}")]
    Watch(#[from] notify::Error),
}

/// Rejected user input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Timer duration must be positive (got {minutes}m {seconds}s)")]
    NonPositiveDuration { minutes: i64, seconds: i64 },
}
