/*!
Error types for the Phoenix core engine.
*/

use thiserror::Error;

/// Result type used throughout the Phoenix core.
pub type Result<T> = std::result::Result<T, PhoenixError>;

/// Errors that can occur while loading, migrating or saving store state.
#[derive(Error, Debug)]
pub enum PhoenixError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage adapter errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Custom codec failures
    #[error("Codec error: {0}")]
    Codec(String),

    /// A migration step failed while folding over the persisted state
    #[error("Migration '{name}' failed: {message}")]
    Migration { name: String, message: String },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// No async runtime was available to drive background saves
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl PhoenixError {
    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new codec error
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        Self::Codec(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new migration error
    pub fn migration<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self::Migration {
            name: name.into(),
            message: message.into(),
        }
    }
}
