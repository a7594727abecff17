//! Profile management command implementations

use std::path::PathBuf;

use colored::Colorize;
use qnactl_core::ApiKey;
use qnactl_core::config::{Config, Profile, credential};
use serde_json::json;
use tracing::{debug, info};

use crate::cli::{OutputFormat, ProfileCommands};
use crate::connection::ConnectionManager;
use crate::error::{QnaCtlError, Result as CliResult};
use crate::output::{self, print_output};

/// Handle profile management commands
pub async fn handle_profile_command(
    profile_cmd: &ProfileCommands,
    conn_mgr: &ConnectionManager,
    output_format: OutputFormat,
) -> CliResult<()> {
    use ProfileCommands::*;

    match profile_cmd {
        List => handle_list(conn_mgr, output_format),
        Path => handle_path(conn_mgr, output_format),
        Show { name } => handle_show(conn_mgr, name.as_deref(), output_format),
        Set {
            name,
            endpoint,
            subscription_key,
            runtime_endpoint,
            endpoint_key,
            knowledge_base_id,
            poll_interval,
            poll_timeout,
            poll_max_attempts,
            default,
            #[cfg(feature = "secure-storage")]
            use_keyring,
        } => {
            #[cfg(feature = "secure-storage")]
            let use_keyring = *use_keyring;
            #[cfg(not(feature = "secure-storage"))]
            let use_keyring = false;

            let mut profile = conn_mgr
                .config
                .profiles
                .get(name)
                .cloned()
                .unwrap_or_default();

            if endpoint.is_some() {
                profile.endpoint = endpoint.clone();
            }
            if runtime_endpoint.is_some() {
                profile.runtime_endpoint = runtime_endpoint.clone();
            }
            if knowledge_base_id.is_some() {
                profile.knowledge_base_id = knowledge_base_id.clone();
            }
            if let Some(key) = subscription_key {
                profile.subscription_key = Some(store_key(
                    name,
                    "subscription-key",
                    key,
                    use_keyring,
                )?);
            }
            if let Some(key) = endpoint_key {
                profile.endpoint_key = Some(store_key(name, "endpoint-key", key, use_keyring)?);
            }
            profile.polling =
                profile
                    .polling
                    .with_overrides(*poll_interval, *poll_timeout, *poll_max_attempts);

            handle_set(conn_mgr, name, profile, *default)
        }
        Remove { name } => handle_remove(conn_mgr, name),
    }
}

fn handle_list(conn_mgr: &ConnectionManager, output_format: OutputFormat) -> CliResult<()> {
    let profiles = conn_mgr.config.list_profiles();
    let default = conn_mgr.config.default_profile.as_deref();
    debug!("Found {} profiles", profiles.len());

    if let Some(fmt) = output::OutputFormat::structured(output_format) {
        let rows: Vec<_> = profiles
            .iter()
            .map(|(name, profile)| {
                json!({
                    "name": name,
                    "default": default == Some(name.as_str()),
                    "endpoint": profile.endpoint,
                    "runtime_endpoint": profile.runtime_endpoint,
                    "knowledge_base_id": profile.knowledge_base_id,
                })
            })
            .collect();
        print_output(&rows, fmt)?;
        return Ok(());
    }

    if profiles.is_empty() {
        println!("No profiles configured.");
        println!("Create one with: qnactl profile set <name> --endpoint <url> --subscription-key <key>");
        return Ok(());
    }

    for (name, profile) in profiles {
        let marker = if default == Some(name.as_str()) {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{} {:<16} {}",
            marker,
            name,
            profile.endpoint.as_deref().unwrap_or("(no endpoint)")
        );
    }
    Ok(())
}

fn config_path(conn_mgr: &ConnectionManager) -> CliResult<PathBuf> {
    match &conn_mgr.config_path {
        Some(path) => Ok(path.clone()),
        None => Ok(Config::config_path()?),
    }
}

fn handle_path(conn_mgr: &ConnectionManager, output_format: OutputFormat) -> CliResult<()> {
    let config_path = config_path(conn_mgr)?;

    match output::OutputFormat::structured(output_format) {
        Some(fmt) => print_output(json!({ "config_path": config_path.to_str() }), fmt)?,
        None => println!("{}", config_path.display()),
    }
    Ok(())
}

fn handle_show(
    conn_mgr: &ConnectionManager,
    name: Option<&str>,
    output_format: OutputFormat,
) -> CliResult<()> {
    let explicit = name.or(conn_mgr.profile.as_deref());
    let resolved = conn_mgr
        .config
        .resolve_profile(explicit)?
        .ok_or_else(|| QnaCtlError::Configuration("No profile configured".to_string()))?;
    let profile = conn_mgr
        .config
        .profiles
        .get(&resolved)
        .ok_or_else(|| QnaCtlError::ProfileNotFound {
            name: resolved.clone(),
        })?;
    let is_default = conn_mgr.config.default_profile.as_deref() == Some(resolved.as_str());

    if let Some(fmt) = output::OutputFormat::structured(output_format) {
        let data = json!({
            "name": resolved,
            "default": is_default,
            "endpoint": profile.endpoint,
            "subscription_key": profile.subscription_key.as_deref().map(key_preview),
            "runtime_endpoint": profile.runtime_endpoint,
            "endpoint_key": profile.endpoint_key.as_deref().map(key_preview),
            "knowledge_base_id": profile.knowledge_base_id,
            "polling": profile.polling,
        });
        print_output(&data, fmt)?;
        return Ok(());
    }

    println!("Profile: {}{}", resolved, if is_default { " (default)" } else { "" });
    println!("Endpoint: {}", profile.endpoint.as_deref().unwrap_or("-"));
    println!(
        "Subscription key: {}",
        profile
            .subscription_key
            .as_deref()
            .map(key_preview)
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "Runtime endpoint: {}",
        profile.runtime_endpoint.as_deref().unwrap_or("-")
    );
    println!(
        "Endpoint key: {}",
        profile
            .endpoint_key
            .as_deref()
            .map(key_preview)
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "Knowledge base: {}",
        profile.knowledge_base_id.as_deref().unwrap_or("-")
    );
    println!(
        "Polling: every {}s without Retry-After, timeout {}, max checks {}",
        profile.polling.default_retry_interval_secs,
        profile
            .polling
            .timeout_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "none".to_string()),
        profile
            .polling
            .max_attempts
            .map(|n| n.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    Ok(())
}

fn handle_set(
    conn_mgr: &ConnectionManager,
    name: &str,
    profile: Profile,
    make_default: bool,
) -> CliResult<()> {
    let mut config = conn_mgr.config.clone();
    let existed = config.profiles.contains_key(name);
    config.set_profile(name.to_string(), profile);

    // The first profile becomes the default
    if make_default || config.default_profile.is_none() {
        config.default_profile = Some(name.to_string());
    }

    conn_mgr.save_config(&config)?;
    info!("Saved profile '{}'", name);

    if existed {
        println!("Profile '{}' updated", name);
    } else {
        println!("Profile '{}' created", name);
    }
    if config.default_profile.as_deref() == Some(name) {
        println!("'{}' is the default profile", name);
    }
    Ok(())
}

fn handle_remove(conn_mgr: &ConnectionManager, name: &str) -> CliResult<()> {
    debug!("Removing profile: {}", name);

    let mut config = conn_mgr.config.clone();
    let Some(profile) = config.remove_profile(name) else {
        return Err(QnaCtlError::ProfileNotFound { name: name.into() });
    };

    // Keys stored in the keyring go with the profile
    for value in [&profile.subscription_key, &profile.endpoint_key]
        .into_iter()
        .flatten()
    {
        credential::forget_reference(value)?;
    }

    conn_mgr.save_config(&config)?;
    println!("Profile '{}' removed", name);
    Ok(())
}

/// Value to write to the config file for a key, storing it in the keyring
/// when asked to
fn store_key(profile: &str, kind: &str, value: &str, use_keyring: bool) -> CliResult<String> {
    if !use_keyring || value.starts_with("${") || credential::is_keyring_reference(value) {
        return Ok(value.to_string());
    }
    if !credential::keyring_available() {
        return Err(QnaCtlError::Configuration(
            "OS keyring is not available; omit --use-keyring to store the key in the config file"
                .to_string(),
        ));
    }

    #[cfg(feature = "secure-storage")]
    {
        Ok(credential::store_in_keyring(
            &format!("{}-{}", profile, kind),
            value,
        )?)
    }
    #[cfg(not(feature = "secure-storage"))]
    {
        let _ = (profile, kind);
        Ok(value.to_string())
    }
}

/// Masked key, or the reference itself when the key is stored elsewhere
fn key_preview(value: &str) -> String {
    if value.starts_with("${") || credential::is_keyring_reference(value) {
        value.to_string()
    } else {
        ApiKey::new(value).masked()
    }
}
