//! Bridge configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration for clients, bridges and the connection registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Request/reply behaviour of each client
    pub client: ClientConfig,
    /// Host-side status derivation
    pub status: StatusConfig,
}

impl BridgeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout cannot be 0".into(),
            ));
        }

        if matches!(self.client.sweep_interval, Some(interval) if interval.is_zero()) {
            return Err(ConfigError::InvalidTimeout(
                "sweep_interval cannot be 0".into(),
            ));
        }

        if self.status.observation_window.is_zero() {
            return Err(ConfigError::InvalidWindow(
                "observation_window cannot be 0".into(),
            ));
        }

        if self.status.app_event.trim().is_empty() {
            return Err(ConfigError::InvalidEventName(
                "app_event cannot be empty".into(),
            ));
        }

        if self.status.app_event == bridge_types::READY_EVENT {
            return Err(ConfigError::InvalidEventName(format!(
                "app_event cannot be the reserved '{}' event",
                bridge_types::READY_EVENT
            )));
        }

        Ok(())
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Default deadline for a reply
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Interval of the background sweep removing abandoned pending entries
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            sweep_interval: Some(Duration::from_secs(30)),
        }
    }
}

/// Status derivation for host-side connections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// How long the host waits for guest signals before reporting a cause
    #[serde(with = "humantime_serde")]
    pub observation_window: Duration,
    /// Name of the application event that proves the guest started
    pub app_event: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            observation_window: Duration::from_secs(2),
            app_event: "hello".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("Invalid observation window: {0}")]
    InvalidWindow(String),
    #[error("Invalid event name: {0}")]
    InvalidEventName(String),
}
