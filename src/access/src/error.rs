//! Error types for the access-control engine

use thiserror::Error;

/// Access-control errors
///
/// Business-level denials are never errors; they are [`crate::Decision`]
/// values. These variants cover authentication, infrastructure and
/// configuration failures.
#[derive(Debug, Error)]
pub enum AccessError {
    /// No subject could be resolved for the request
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Grant backing store unreachable or timed out
    #[error("Grant store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed resource path
    #[error("Invalid resource path: {0}")]
    InvalidPath(String),

    /// Invalid policy or server configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for access-control operations
pub type Result<T> = std::result::Result<T, AccessError>;
