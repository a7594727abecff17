//! Profile keys: redaction and OS keyring references
//!
//! A key in a profile is written as plaintext, as a `${VAR}` reference, or as
//! `keyring:<name>` when `qnactl profile set --use-keyring` moved it into the
//! OS keyring. Keyring support needs the `secure-storage` feature.

use super::error::{ConfigError, Result};
use std::fmt;

const KEYRING_PREFIX: &str = "keyring:";

#[cfg(feature = "secure-storage")]
const SERVICE_NAME: &str = "qnactl";

/// A subscription or endpoint key
///
/// Formatting always redacts the value; use [`ApiKey::expose`] at the point the
/// key is put on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Last four characters, for confirming which key is configured
    pub fn masked(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if self.0.chars().count() <= 4 {
            "****".to_string()
        } else {
            format!("****{}", tail)
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Whether `value` names a keyring entry rather than holding a key
pub fn is_keyring_reference(value: &str) -> bool {
    value.starts_with(KEYRING_PREFIX)
}

/// Whether an OS keyring can be reached from this process
pub fn keyring_available() -> bool {
    #[cfg(feature = "secure-storage")]
    {
        keyring::Entry::new(SERVICE_NAME, "__availability__").is_ok()
    }
    #[cfg(not(feature = "secure-storage"))]
    {
        false
    }
}

/// Key behind a stored profile value
///
/// Keyring references are looked up; anything else is already the key.
pub fn resolve_reference(value: &str) -> Result<String> {
    let Some(name) = value.strip_prefix(KEYRING_PREFIX) else {
        return Ok(value.to_string());
    };

    #[cfg(feature = "secure-storage")]
    {
        entry(name)?.get_password().map_err(|e| {
            ConfigError::KeyringError(format!("Cannot read '{}' from the keyring: {}", name, e))
        })
    }
    #[cfg(not(feature = "secure-storage"))]
    {
        Err(ConfigError::CredentialError(format!(
            "'{}' is stored in the keyring, but qnactl was built without secure-storage",
            name
        )))
    }
}

/// Save a key in the keyring under `name`, returning the reference to write
/// to the profile
#[cfg(feature = "secure-storage")]
pub fn store_in_keyring(name: &str, value: &str) -> Result<String> {
    entry(name)?.set_password(value).map_err(|e| {
        ConfigError::KeyringError(format!("Cannot save '{}' to the keyring: {}", name, e))
    })?;
    Ok(format!("{}{}", KEYRING_PREFIX, name))
}

/// Drop the keyring entry behind a reference; plain values are ignored
pub fn forget_reference(value: &str) -> Result<()> {
    let Some(name) = value.strip_prefix(KEYRING_PREFIX) else {
        return Ok(());
    };

    #[cfg(feature = "secure-storage")]
    {
        match entry(name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(ConfigError::KeyringError(format!(
                "Cannot remove '{}' from the keyring: {}",
                name, e
            ))),
        }
    }
    #[cfg(not(feature = "secure-storage"))]
    {
        tracing::warn!("Keyring entry '{}' left in place without secure-storage", name);
        Ok(())
    }
}

#[cfg(feature = "secure-storage")]
fn entry(name: &str) -> Result<keyring::Entry> {
    keyring::Entry::new(SERVICE_NAME, name).map_err(|e| ConfigError::KeyringError(e.to_string()))
}
