use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;
use crate::retrieval::{FusionError, RetrievalError};
use crate::storage::StorageError;

/// Main error type for the askdb core
#[derive(Error, Debug)]
pub enum AskdbError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Retrieval path errors
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Rank fusion errors
    #[error(transparent)]
    Fusion(#[from] FusionError),

    /// Workflow engine errors
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Session or checkpoint persistence errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for askdb operations
pub type Result<T> = std::result::Result<T, AskdbError>;
