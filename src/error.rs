use std::path::PathBuf;

use thiserror::Error;

use crate::codemod::CodemodError;

pub type Result<T> = std::result::Result<T, ModernizeError>;

#[derive(Error, Debug)]
pub enum ModernizeError {
    // Standard library errors with automatic conversion
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Rewrite engine errors (one file)
    #[error("Codemod error: {0}")]
    Codemod(#[from] CodemodError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Input discovery errors
    #[error("Path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("No Python files found to process")]
    NoPythonFiles,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<&str> for ModernizeError {
    fn from(msg: &str) -> Self {
        ModernizeError::Internal(msg.to_string())
    }
}

impl From<String> for ModernizeError {
    fn from(msg: String) -> Self {
        ModernizeError::Internal(msg)
    }
}

// Convert from anyhow::Error for CLI integration
impl From<anyhow::Error> for ModernizeError {
    fn from(err: anyhow::Error) -> Self {
        ModernizeError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for ModernizeError {
    fn from(err: config::ConfigError) -> Self {
        ModernizeError::Configuration(err.to_string())
    }
}

impl From<regex::Error> for ModernizeError {
    fn from(err: regex::Error) -> Self {
        ModernizeError::Configuration(format!("invalid exclude pattern: {}", err))
    }
}
