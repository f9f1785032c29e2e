//! Error types for configuration loading and resolution.

use std::path::PathBuf;

use thiserror::Error;

use crate::mode::Mode;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document exists but could not be parsed.
    #[error("malformed config document {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    /// A preprocessor named for a mode has no registered implementation.
    #[error("preprocessor '{name}' is required for {mode} mode but is not registered")]
    MissingPreprocessor { name: String, mode: Mode },

    #[error("invalid config value for '{field}'{}", hint.as_ref().map(|h| format!(": {h}")).unwrap_or_default())]
    InvalidValue { field: String, hint: Option<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// The option key or file the error points at, for user-facing messages.
    pub fn offending_key(&self) -> Option<String> {
        match self {
            ConfigError::Malformed { path, .. } => Some(path.display().to_string()),
            ConfigError::MissingPreprocessor { name, .. } => Some(format!("preprocess.{name}")),
            ConfigError::InvalidValue { field, .. } => Some(field.clone()),
            ConfigError::Io(_) => None,
        }
    }
}
