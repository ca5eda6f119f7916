//! # Runtime Configuration
//!
//! Defaults plus environment overrides:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `BRIDGE_SCENARIO` | `none`, `no_hello`, `no_ready`, `two_guests` |
//! | `BRIDGE_REQUEST_TIMEOUT_MS` | default request timeout |
//! | `BRIDGE_OBSERVATION_WINDOW_MS` | status observation window |
//! | `BRIDGE_APP_EVENT` | application event name (default `hello`) |
//! | `BRIDGE_HOST_ORIGIN` | origin the host page runs on |
//! | `BRIDGE_AUTH_TOKEN` | token pushed to guests |
//! | `BRIDGE_AUTH_EXPIRES_AT` | RFC 3339 expiry of that token |

use crate::scenario::{Scenario, UnknownScenario};
use bridge_core::{BridgeConfig, ConfigError};
use bridge_types::{Context, Credential, Origin};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("BRIDGE_AUTH_EXPIRES_AT is not an RFC 3339 timestamp: {0}")]
    InvalidExpiry(#[from] chrono::ParseError),

    #[error(transparent)]
    Scenario(#[from] UnknownScenario),

    #[error(transparent)]
    Bridge(#[from] ConfigError),
}

/// Everything the runtime needs to drive one scenario.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bridge: BridgeConfig,
    pub scenario: Scenario,
    pub host_origin: Origin,
    pub auth: Credential,
    /// Host-supplied data pushed with the credential
    pub data: serde_json::Value,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            scenario: Scenario::None,
            host_origin: Origin::new("http://localhost:8080"),
            auth: Credential::new("dev-token", Utc::now() + ChronoDuration::minutes(15)),
            data: json!({}),
        }
    }
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, RuntimeConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` for every variable, then validate.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RuntimeConfigError> {
        let mut config = Self::default();

        if let Some(scenario) = lookup("BRIDGE_SCENARIO") {
            config.scenario = scenario.parse()?;
        }
        if let Some(value) = lookup("BRIDGE_REQUEST_TIMEOUT_MS") {
            config.bridge.client.request_timeout = parse_millis("BRIDGE_REQUEST_TIMEOUT_MS", value)?;
        }
        if let Some(value) = lookup("BRIDGE_OBSERVATION_WINDOW_MS") {
            config.bridge.status.observation_window =
                parse_millis("BRIDGE_OBSERVATION_WINDOW_MS", value)?;
        }
        if let Some(event) = lookup("BRIDGE_APP_EVENT") {
            config.bridge.status.app_event = event;
        }
        if let Some(origin) = lookup("BRIDGE_HOST_ORIGIN") {
            config.host_origin = Origin::new(origin);
        }
        if let Some(token) = lookup("BRIDGE_AUTH_TOKEN") {
            config.auth.token = token;
        }
        if let Some(expires_at) = lookup("BRIDGE_AUTH_EXPIRES_AT") {
            config.auth.expires_at = DateTime::parse_from_rfc3339(&expires_at)?.with_timezone(&Utc);
        }

        config.bridge.validate()?;
        Ok(config)
    }

    /// Context pushed to every guest.
    pub fn context(&self) -> Context {
        Context::new(self.auth.clone(), self.data.clone())
    }

    /// Origin a guest frame named `name` is served from.
    pub fn guest_origin(&self, name: &str) -> Origin {
        Origin::new(format!("https://{name}.guest.localhost"))
    }
}

fn parse_millis(name: &'static str, value: String) -> Result<Duration, RuntimeConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(RuntimeConfigError::InvalidNumber { name, value }),
    }
}
