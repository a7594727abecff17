//! Polling configuration for long-running operations
//!
//! Stored per profile. The fallback retry interval applies whenever the
//! service does not send `Retry-After`; the bounds are off unless set.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::poller::PollerConfig;

/// Fallback wait between status checks when the service gives no hint
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds to wait when the status response has no `Retry-After`
    #[serde(default = "default_retry_interval")]
    pub default_retry_interval_secs: u64,

    /// Give up after this many seconds (unbounded when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Give up after this many status checks (unbounded when unset, never zero)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<NonZeroU32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            default_retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            timeout_secs: None,
            max_attempts: None,
        }
    }
}

impl PollingConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Apply command line overrides on top of the stored values
    pub fn with_overrides(
        mut self,
        retry_interval_secs: Option<u64>,
        timeout_secs: Option<u64>,
        max_attempts: Option<u32>,
    ) -> Self {
        if let Some(secs) = retry_interval_secs {
            self.default_retry_interval_secs = secs;
        }
        if timeout_secs.is_some() {
            self.timeout_secs = timeout_secs;
        }
        if let Some(max) = max_attempts.and_then(NonZeroU32::new) {
            self.max_attempts = Some(max);
        }
        self
    }

    pub fn to_poller_config(&self) -> PollerConfig {
        PollerConfig {
            default_retry_interval: Duration::from_secs(self.default_retry_interval_secs),
            timeout: self.timeout_secs.map(Duration::from_secs),
            max_attempts: self.max_attempts.map(NonZeroU32::get),
        }
    }
}

fn default_retry_interval() -> u64 {
    DEFAULT_RETRY_INTERVAL_SECS
}
