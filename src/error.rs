//! Error types for the Casebook memory engine
//!
//! Errors are structured with thiserror. Storage failures are represented
//! explicitly here so the entry store can decide, visibly, to degrade them
//! into empty data or a [`SaveReport`](crate::storage::SaveReport) instead
//! of propagating them to the agent that asked for help.

use thiserror::Error;

/// Main error type for Casebook operations
#[derive(Error, Debug)]
pub enum CasebookError {
    /// A persisted collection could not be read or decoded
    #[error("Failed to read {collection} for namespace '{namespace}': {message}")]
    StorageRead {
        namespace: String,
        collection: String,
        message: String,
    },

    /// A collection could not be written
    #[error("Failed to write {collection} for namespace '{namespace}': {message}")]
    StorageWrite {
        namespace: String,
        collection: String,
        message: String,
    },

    /// Namespace name is empty or would escape the storage root
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Casebook operations
pub type Result<T> = std::result::Result<T, CasebookError>;

impl From<config::ConfigError> for CasebookError {
    fn from(err: config::ConfigError) -> Self {
        CasebookError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for CasebookError {
    fn from(err: toml::de::Error) -> Self {
        CasebookError::Config(err.to_string())
    }
}
