//! Error types for the toolbox core.

use thiserror::Error;

/// Result type alias for toolbox operations.
pub type Result<T> = std::result::Result<T, ToolboxError>;

/// Errors that can occur in the toolbox core.
#[derive(Error, Debug)]
pub enum ToolboxError {
    /// Tool or artifact not found.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Id collision on create, rename, or import.
    #[error("tool already exists: {0}")]
    Conflict(String),

    /// Malformed user input (empty prompt, bad id, non-positive budget).
    #[error("invalid input: {0}")]
    Validation(String),

    /// The generation backend failed or returned unusable content.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
