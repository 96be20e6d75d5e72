use std::net::SocketAddr;
use std::time::Duration;

use health_provider_client::config::ProviderConfig;

use crate::error::{BridgeError, BridgeResult};

pub const DEFAULT_WINDOW_HOURS: u32 = 12;
pub const MAX_WINDOW_HOURS: u32 = 24 * 365;
pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(120);
/// Slack the HTTP layer allows on top of the consent timeout.
pub const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

/// `HEALTH_BRIDGE_LOG_LEVEL`, then `RUST_LOG`, then `info`.
pub fn log_filter_with<F>(mut get: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    get("HEALTH_BRIDGE_LOG_LEVEL")
        .or_else(|| get("RUST_LOG"))
        .unwrap_or_else(|| "info".to_string())
}

/// Bridge and provider settings read through the same lookup.
pub fn load_with<F>(mut get: F) -> BridgeResult<(BridgeConfig, ProviderConfig)>
where
    F: FnMut(&str) -> Option<String>,
{
    let bridge = BridgeConfig::from_env_with(&mut get)?;
    let provider = ProviderConfig::from_env_with(&mut get)?;
    Ok((bridge, provider))
}

#[derive(Clone, Debug)]
pub struct AcquisitionConfig {
    /// Length of the trailing window applied to both reads.
    pub window_hours: u32,
    /// Upper bound on the interactive permission prompt.
    pub consent_timeout: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_WINDOW_HOURS,
            consent_timeout: DEFAULT_CONSENT_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub acquisition: AcquisitionConfig,
    pub address: SocketAddr,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    pub fn from_env_with<F>(mut get: F) -> Result<Self, BridgeError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let window_hours = match get("HEALTH_BRIDGE_WINDOW_HOURS") {
            Some(raw) => parse_positive("HEALTH_BRIDGE_WINDOW_HOURS", &raw)?,
            None => DEFAULT_WINDOW_HOURS,
        };
        if window_hours > MAX_WINDOW_HOURS {
            return Err(BridgeError::Config(format!(
                "HEALTH_BRIDGE_WINDOW_HOURS must be at most {MAX_WINDOW_HOURS}, got {window_hours}"
            )));
        }
        let consent_timeout = match get("HEALTH_BRIDGE_CONSENT_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(u64::from(parse_positive(
                "HEALTH_BRIDGE_CONSENT_TIMEOUT_SECS",
                &raw,
            )?)),
            None => DEFAULT_CONSENT_TIMEOUT,
        };
        let address = match get("HEALTH_BRIDGE_ADDRESS") {
            Some(raw) => raw.parse().map_err(|e| {
                BridgeError::Config(format!("HEALTH_BRIDGE_ADDRESS {raw:?}: {e}"))
            })?,
            None => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };
        Ok(Self {
            acquisition: AcquisitionConfig {
                window_hours,
                consent_timeout,
            },
            address,
        })
    }

    /// Lifetime of one HTTP request; always outlasts a pending consent prompt.
    pub fn request_timeout(&self) -> Duration {
        self.acquisition.consent_timeout + REQUEST_TIMEOUT_MARGIN
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<u32, BridgeError> {
    match raw.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(BridgeError::Config(format!(
            "{name} must be a positive integer, got {raw:?}"
        ))),
    }
}
