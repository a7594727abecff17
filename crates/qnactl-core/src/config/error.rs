//! Error types for configuration operations

use std::fmt;
use thiserror::Error;

/// A required setting that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSetting {
    /// Profile key in config.toml
    pub field: &'static str,
    /// Environment variable that can supply it
    pub env_var: &'static str,
}

impl fmt::Display for MissingSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' (set {} or add it to the profile)",
            self.field, self.env_var
        )
    }
}

fn format_missing(missing: &[MissingSetting]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur during configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config from {path}: {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save config to {path}: {source}")]
    SaveError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("Missing required settings: {}", format_missing(.0))]
    MissingSettings(Vec<MissingSetting>),

    #[error("Invalid value for '{field}': {message}")]
    InvalidSetting { field: &'static str, message: String },

    #[error("Failed to resolve credential: {0}")]
    CredentialError(String),

    #[cfg(feature = "secure-storage")]
    #[error("Keyring error: {0}")]
    KeyringError(String),

    #[error("Failed to determine config directory")]
    ConfigDirError,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
