//! Error types for ebb

use thiserror::Error;

/// Main error type for ebb operations
#[derive(Error, Debug)]
pub enum EbbError {
    /// Storage-related errors (key-value backend, file system, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session identifier errors
    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionIdError),

    /// Intervention delivery errors
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl From<serde_json::Error> for EbbError {
    fn from(e: serde_json::Error) -> Self {
        EbbError::Serialization(e.to_string())
    }
}

/// Lookup misses reported by memory operations.
///
/// These are expected outcomes rather than failures, so they are kept
/// apart from [`EbbError`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No stored item matched the request
    #[error("No memory item contains \"{0}\"")]
    NotFound(String),

    /// The category name is not part of the category table
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

/// Result type alias for ebb operations
pub type Result<T> = std::result::Result<T, EbbError>;
