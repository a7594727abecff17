//! Configuration and profile management for qnactl
//!
//! This module provides the configuration system for knowledge base
//! resources: named profiles in a TOML file, environment variable overrides,
//! and validation of the settings each command requires.
//!
//! # Features
//!
//! - Multiple named profiles for different resources
//! - Secure credential storage using OS keyring (optional)
//! - `${VAR}` references in profile values, expanded when settings resolve
//! - Platform-specific config file locations
//! - Per-profile polling bounds for long-running operations

#[allow(clippy::module_inception)]
pub mod config;
pub mod credential;
pub mod error;
pub mod polling;

// Re-export main types for convenience
pub use config::{
    AuthoringSettings, Config, ENDPOINT_ENV, ENDPOINT_KEY_ENV, KB_ID_ENV, Profile,
    RUNTIME_ENDPOINT_ENV, RuntimeSettings, SUBSCRIPTION_KEY_ENV, Settings,
};
pub use credential::ApiKey;
pub use error::{ConfigError, MissingSetting, Result};
pub use polling::{DEFAULT_RETRY_INTERVAL_SECS, PollingConfig};
