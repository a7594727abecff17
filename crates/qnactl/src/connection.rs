//! Connection management for the authoring and runtime clients

use std::path::PathBuf;

use anyhow::Context;
use qnactl_core::config::{Config, PollingConfig, Settings};
use qnactl_core::{ApiKey, PollerConfig, QnaMakerClient, RuntimeClient};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result as CliResult;

/// Command line overrides for operation polling
#[derive(Debug, Clone, Copy, Default)]
pub struct PollingOverrides {
    pub retry_interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// Connection manager for creating authenticated clients
#[derive(Clone)]
pub struct ConnectionManager {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub polling: PollingOverrides,
    /// Cancelled on Ctrl-C
    pub cancel: CancellationToken,
}

impl ConnectionManager {
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        profile: Option<String>,
        polling: PollingOverrides,
    ) -> Self {
        Self {
            config,
            config_path,
            profile,
            polling,
            cancel: CancellationToken::new(),
        }
    }

    /// Save the configuration to the appropriate location
    pub fn save_config(&self, config: &Config) -> CliResult<()> {
        if let Some(ref path) = self.config_path {
            config
                .save_to_path(path)
                .context("Failed to save configuration")?;
        } else {
            config.save().context("Failed to save configuration")?;
        }
        Ok(())
    }

    /// Profile values merged with the environment
    pub fn settings(&self) -> CliResult<Settings> {
        let settings = Settings::resolve(&self.config, self.profile.as_deref())?;
        match &settings.profile_name {
            Some(name) => debug!("Using profile '{}'", name),
            None => debug!("No profile selected, using environment only"),
        }
        Ok(settings)
    }

    /// Poll pacing from the profile, with command line overrides applied
    pub fn poller_config(&self, settings: &Settings) -> PollerConfig {
        let polling: PollingConfig = settings.polling.clone().with_overrides(
            self.polling.retry_interval_secs,
            self.polling.timeout_secs,
            self.polling.max_attempts,
        );
        polling.to_poller_config()
    }

    /// Create an authoring client from the resolved settings
    pub fn create_client(&self, settings: &Settings) -> CliResult<QnaMakerClient> {
        let auth = settings.authoring()?;
        info!("Using authoring endpoint {}", auth.endpoint);
        let poller = self.poller_config(settings);

        let client = QnaMakerClient::builder()
            .endpoint(auth.endpoint)
            .subscription_key(auth.subscription_key)
            .default_retry_interval(poller.default_retry_interval)
            .build()?;
        Ok(client)
    }

    /// Create a runtime client from the resolved settings
    pub fn create_runtime_client(&self, settings: &Settings) -> CliResult<RuntimeClient> {
        let runtime = settings.runtime()?;
        info!("Using runtime endpoint {}", runtime.endpoint);
        Ok(RuntimeClient::new(&runtime.endpoint, runtime.endpoint_key)?)
    }

    /// Create a runtime client with an endpoint key fetched from the resource
    /// when none is configured
    pub async fn create_runtime_client_with_lookup(
        &self,
        settings: &Settings,
        client: &QnaMakerClient,
    ) -> CliResult<RuntimeClient> {
        if settings.endpoint_key.is_some() {
            return self.create_runtime_client(settings);
        }

        debug!("No endpoint key configured, fetching it from the resource");
        let keys = client.endpoint_keys().await?;
        let mut settings = settings.clone();
        settings.endpoint_key = keys.primary_endpoint_key.map(ApiKey::new);
        self.create_runtime_client(&settings)
    }
}
