//! Shared test fixtures.

use bridge_core::{
    Bridge, BridgeClient, BridgeConfig, ClientConfig, FrameRef, GuestOptions, StatusConfig,
};
use bridge_runtime::{RuntimeConfig, Scenario};
use bridge_transport::{FramePort, MessageChannel};
use bridge_types::{Context, Credential, Origin};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const HOST_ORIGIN: &str = "http://localhost:8080";

pub const TOKEN: &str = "eyJhbGciOiJFZERTQSIsImNydiI6IkVkMjU1MTkiLCJraWQiOiJhcHBfMTIzIn0.\
eyJwdXJwb3NlIjoidmVyaWZpY2F0aW9uIiwiYXBwIjoiYXBwXzEyMyIsInVzciI6InVzcl8xMjMiLCJpYXQiOjE2NDE1MDExOTQsImlzcyI6InNvdXJjZWhlYWx0aCIsImV4cCI6MTY0MTUwMjA5NH0.\
3oYyGr4XHSuZENF121lYVIumI32ZdRH6RV5b0emG8p_yHuPm-TL1dSU4Y3v6OYnzPs0qi2H8sTUCruXNg4Z0CA";

pub const EXPIRES_AT: &str = "2022-01-06T20:48:14.919Z";

pub fn credential() -> Credential {
    let expires_at = DateTime::parse_from_rfc3339(EXPIRES_AT)
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_default();
    Credential::new(TOKEN, expires_at)
}

/// `auth` exactly as the guest page renders it.
pub fn auth_json() -> Value {
    json!({ "expiresAt": EXPIRES_AT, "token": TOKEN })
}

pub fn context() -> Context {
    Context::new(credential(), json!({ "app": "app_123" }))
}

/// Short timings so scenario tests finish quickly.
pub fn bridge_config() -> BridgeConfig {
    BridgeConfig {
        client: ClientConfig {
            request_timeout: Duration::from_secs(1),
            sweep_interval: Some(Duration::from_millis(100)),
        },
        status: StatusConfig {
            observation_window: Duration::from_millis(300),
            app_event: "hello".into(),
        },
    }
}

pub fn runtime_config(scenario: Scenario) -> RuntimeConfig {
    RuntimeConfig {
        bridge: bridge_config(),
        scenario,
        host_origin: Origin::new(HOST_ORIGIN),
        auth: credential(),
        data: json!({ "app": "app_123" }),
    }
}

pub fn guest_origin(name: &str) -> Origin {
    Origin::new(format!("https://{name}.guest.localhost"))
}

/// Host-side frame reference plus the guest's end of the channel.
pub fn frame(name: &str) -> (FrameRef, FramePort) {
    let (host_port, guest_port) = MessageChannel::pair(HOST_ORIGIN.into(), guest_origin(name));
    (
        FrameRef::new(name, guest_origin(name), Arc::new(host_port)),
        guest_port,
    )
}

/// A bare guest bridge, not yet initialized.
pub fn guest_bridge(name: &str, port: FramePort) -> Bridge {
    match BridgeClient::new(
        format!("guest/{name}"),
        Arc::new(port),
        HOST_ORIGIN.into(),
        bridge_config().client,
    ) {
        Ok(client) => Bridge::guest(client, GuestOptions::default()),
        Err(e) => panic!("fresh port refused: {e}"),
    }
}
