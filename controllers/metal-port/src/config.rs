//! Controller configuration, read from environment variables

use crate::error::ControllerError;
use metal_client::waiters::BatchPolling;
use metal_client::DEFAULT_BASE_URL;
use port_reconciler::ReconcilerSettings;
use std::time::Duration;

const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_BATCH_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub metal_api_url: String,
    pub metal_auth_token: String,
    /// `None` watches all namespaces
    pub namespace: Option<String>,
    /// Budget for one reconcile or reset
    pub reconcile_timeout: Duration,
    /// Floor for VLAN batch polling, also used as the delay before the first poll
    pub batch_poll_interval: Duration,
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let metal_api_url = lookup("METAL_API_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let metal_auth_token = lookup("METAL_AUTH_TOKEN")
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ControllerError::InvalidConfig("METAL_AUTH_TOKEN environment variable is required".to_string())
            })?;
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let reconcile_timeout = seconds(&lookup, "PORT_RECONCILE_TIMEOUT_SECS", DEFAULT_RECONCILE_TIMEOUT_SECS)?;
        let batch_poll_interval = seconds(&lookup, "BATCH_POLL_INTERVAL_SECS", DEFAULT_BATCH_POLL_INTERVAL_SECS)?;

        Ok(Self {
            metal_api_url,
            metal_auth_token,
            namespace,
            reconcile_timeout,
            batch_poll_interval,
        })
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            batch_polling: BatchPolling {
                initial_delay: self.batch_poll_interval,
                min_poll_interval: self.batch_poll_interval,
                poll_interval: None,
            },
            ..ReconcilerSettings::default()
        }
    }
}

fn seconds<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ControllerError::InvalidConfig(format!("{} must be greater than zero", key))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ControllerError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))),
    }
}
