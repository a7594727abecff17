//! Configuration management for qnactl
//!
//! Handles configuration loading from files and environment variables.
//! Configuration is stored in TOML format with support for multiple named
//! profiles, one per knowledge base resource.
//!
//! ```toml
//! default_profile = "westus"
//!
//! [profiles.westus]
//! endpoint = "https://westus.api.cognitive.microsoft.com"
//! subscription_key = "${QNA_MAKER_SUBSCRIPTION_KEY}"
//! runtime_endpoint = "https://my-qna.azurewebsites.net"
//! endpoint_key = "keyring:westus-endpoint-key"
//!
//! [profiles.westus.polling]
//! default_retry_interval_secs = 30
//! timeout_secs = 900
//! ```

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::credential::{self, ApiKey};
use super::error::{ConfigError, MissingSetting, Result};
use super::polling::PollingConfig;

/// Authoring endpoint, e.g. `https://westus.api.cognitive.microsoft.com`
pub const ENDPOINT_ENV: &str = "QNA_MAKER_ENDPOINT";
/// Authoring subscription key
pub const SUBSCRIPTION_KEY_ENV: &str = "QNA_MAKER_SUBSCRIPTION_KEY";
/// Runtime host serving `generateAnswer`
pub const RUNTIME_ENDPOINT_ENV: &str = "QNA_MAKER_RUNTIME_ENDPOINT";
/// Runtime endpoint key (not the subscription key)
pub const ENDPOINT_KEY_ENV: &str = "QNA_MAKER_ENDPOINT_KEY";
/// Knowledge base to act on when no id is given
pub const KB_ID_ENV: &str = "QNA_MAKER_KB_ID";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Profile used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    /// Map of profile name -> profile configuration
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Individual profile configuration
///
/// Every field is optional in the file; requirements are checked per command
/// when [`Settings`] are resolved.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Plaintext, `${VAR}` or `keyring:<name>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_endpoint: Option<String>,
    /// Plaintext, `${VAR}` or `keyring:<name>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,
    #[serde(default, skip_serializing_if = "PollingConfig::is_default")]
    pub polling: PollingConfig,
}

impl Profile {
    /// Check if this profile has a stored subscription key
    pub fn has_subscription_key(&self) -> bool {
        self.subscription_key.is_some()
    }
}

/// Credentials needed by the authoring (management) API
#[derive(Debug, Clone)]
pub struct AuthoringSettings {
    pub endpoint: String,
    pub subscription_key: ApiKey,
}

/// Credentials needed by the runtime (`generateAnswer`) API
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub endpoint: String,
    pub endpoint_key: ApiKey,
}

/// Settings after merging the selected profile with the environment
///
/// Nothing is required at this stage; the `authoring`/`runtime` accessors
/// enforce what a given command needs and report every missing field at once.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub profile_name: Option<String>,
    pub endpoint: Option<String>,
    pub subscription_key: Option<ApiKey>,
    pub runtime_endpoint: Option<String>,
    pub endpoint_key: Option<ApiKey>,
    pub knowledge_base_id: Option<String>,
    pub polling: PollingConfig,
}

impl Settings {
    /// Resolve settings using the process environment
    pub fn resolve(config: &Config, explicit_profile: Option<&str>) -> Result<Self> {
        Self::resolve_with(config, explicit_profile, |var| std::env::var(var).ok())
    }

    /// Resolve settings with a custom environment lookup
    ///
    /// Environment values win over profile values. Empty environment values
    /// count as unset.
    pub fn resolve_with<F>(config: &Config, explicit_profile: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let profile_name = config.resolve_profile(explicit_profile)?;
        let profile = match &profile_name {
            Some(name) => config
                .profiles
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::ProfileNotFound { name: name.clone() })?,
            None => Profile::default(),
        };

        let lookup = |var: &str, stored: &Option<String>| -> Result<Option<String>> {
            if let Some(value) = env(var).filter(|v| !v.is_empty()) {
                return Ok(Some(value));
            }
            let expanded = stored.as_deref().map(|value| expand_env_vars(value, &env));
            match expanded.as_deref().filter(|v| !v.is_empty()) {
                Some(value) => credential::resolve_reference(value).map(Some),
                None => Ok(None),
            }
        };

        Ok(Self {
            endpoint: lookup(ENDPOINT_ENV, &profile.endpoint)?,
            subscription_key: lookup(SUBSCRIPTION_KEY_ENV, &profile.subscription_key)?
                .map(ApiKey::new),
            runtime_endpoint: lookup(RUNTIME_ENDPOINT_ENV, &profile.runtime_endpoint)?,
            endpoint_key: lookup(ENDPOINT_KEY_ENV, &profile.endpoint_key)?.map(ApiKey::new),
            knowledge_base_id: lookup(KB_ID_ENV, &profile.knowledge_base_id)?,
            polling: profile.polling.clone(),
            profile_name,
        })
    }

    /// Endpoint and subscription key, or every missing field
    pub fn authoring(&self) -> Result<AuthoringSettings> {
        let mut missing = Vec::new();
        if self.endpoint.is_none() {
            missing.push(MissingSetting {
                field: "endpoint",
                env_var: ENDPOINT_ENV,
            });
        }
        if self.subscription_key.is_none() {
            missing.push(MissingSetting {
                field: "subscription_key",
                env_var: SUBSCRIPTION_KEY_ENV,
            });
        }
        match (&self.endpoint, &self.subscription_key) {
            (Some(endpoint), Some(key)) => Ok(AuthoringSettings {
                endpoint: endpoint.clone(),
                subscription_key: key.clone(),
            }),
            _ => Err(ConfigError::MissingSettings(missing)),
        }
    }

    /// Runtime endpoint and endpoint key, or every missing field
    pub fn runtime(&self) -> Result<RuntimeSettings> {
        let mut missing = Vec::new();
        if self.runtime_endpoint.is_none() {
            missing.push(MissingSetting {
                field: "runtime_endpoint",
                env_var: RUNTIME_ENDPOINT_ENV,
            });
        }
        if self.endpoint_key.is_none() {
            missing.push(MissingSetting {
                field: "endpoint_key",
                env_var: ENDPOINT_KEY_ENV,
            });
        }
        match (&self.runtime_endpoint, &self.endpoint_key) {
            (Some(endpoint), Some(key)) => Ok(RuntimeSettings {
                endpoint: endpoint.clone(),
                endpoint_key: key.clone(),
            }),
            _ => Err(ConfigError::MissingSettings(missing)),
        }
    }

    /// An explicit id wins over the configured one
    pub fn knowledge_base_id(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.knowledge_base_id.clone())
            .ok_or_else(|| {
                ConfigError::MissingSettings(vec![MissingSetting {
                    field: "knowledge_base_id",
                    env_var: KB_ID_ENV,
                }])
            })
    }
}

impl Config {
    /// Pick the profile to use
    ///
    /// An explicit name must exist. Otherwise the default profile is used,
    /// then the only profile if there is exactly one. `None` means settings
    /// come from the environment alone.
    pub fn resolve_profile(&self, explicit_profile: Option<&str>) -> Result<Option<String>> {
        if let Some(name) = explicit_profile {
            if !self.profiles.contains_key(name) {
                return Err(ConfigError::ProfileNotFound {
                    name: name.to_string(),
                });
            }
            return Ok(Some(name.to_string()));
        }

        if let Some(default) = &self.default_profile {
            return Ok(Some(default.clone()));
        }

        if self.profiles.len() == 1 {
            return Ok(self.profiles.keys().next().cloned());
        }

        Ok(None)
    }

    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        // `${VAR}` references stay as written so saving never inlines them
        let config: Config = toml::from_str(&content)?;

        Ok(config)
    }

    /// Save configuration to the standard location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to_path(&config_path)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(config_path, content).map_err(|e| ConfigError::SaveError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Set or update a profile
    pub fn set_profile(&mut self, name: String, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    /// Remove a profile by name
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// List all profiles sorted by name
    pub fn list_profiles(&self) -> Vec<(&String, &Profile)> {
        let mut profiles: Vec<_> = self.profiles.iter().collect();
        profiles.sort_by_key(|(name, _)| *name);
        profiles
    }

    /// Get the path to the configuration file
    ///
    /// On macOS, `~/.config/qnactl/config.toml` is preferred when it (or its
    /// directory) exists, falling back to the platform location.
    ///
    /// On Linux: ~/.config/qnactl/config.toml
    /// On Windows: %APPDATA%\qnactl\qnactl\config\config.toml
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(base_dirs) = BaseDirs::new() {
                let linux_style_path = base_dirs
                    .home_dir()
                    .join(".config")
                    .join("qnactl")
                    .join("config.toml");

                if linux_style_path.exists()
                    || linux_style_path
                        .parent()
                        .map(|p| p.exists())
                        .unwrap_or(false)
                {
                    return Ok(linux_style_path);
                }
            }
        }

        let proj_dirs =
            ProjectDirs::from("com", "qnactl", "qnactl").ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

/// Expand `${VAR}` and `${VAR:-default}` references in a profile value.
///
/// Unset variables are left as-is.
fn expand_env_vars<F>(value: &str, env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    shellexpand::env_with_context_no_errors(value, |var| env(var)).into_owned()
}
