//! Scenario runner: one host page, its guest frames, and a report of what
//! each side ended up showing.

use crate::config::RuntimeConfig;
use crate::guest::{GuestApp, GuestView};
use crate::host::HostApp;
use crate::scenario::Scenario;
use bridge_core::{BridgeError, ConnectionStatus, FrameRef, RegistryError};
use bridge_transport::MessageChannel;
use bridge_types::FrameId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Extra time after the observation window before the report is taken.
pub const SETTLE_MARGIN: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Guest {name} failed to load: {source}")]
    GuestLoad { name: String, source: BridgeError },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Final state of both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    /// Host status per guest frame
    pub host: BTreeMap<FrameId, ConnectionStatus>,
    /// What each guest page shows
    pub guests: BTreeMap<String, GuestView>,
}

/// A loaded host page with its guests.
pub struct Session {
    pub host: HostApp,
    pub guests: Vec<GuestApp>,
}

impl Session {
    /// Load the guests, then let the host discover and attach each frame.
    pub async fn load(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let host = HostApp::new(config.context(), config.bridge.clone());
        let behavior = config.scenario.guest_behavior();
        let mut guests = Vec::new();

        for name in config.scenario.guest_names() {
            let guest_origin = config.guest_origin(name);
            let (host_port, guest_port) =
                MessageChannel::pair(config.host_origin.clone(), guest_origin.clone());

            let guest = GuestApp::start(
                *name,
                Arc::new(guest_port),
                config.host_origin.clone(),
                behavior,
                &config.bridge,
            )
            .await
            .map_err(|source| RuntimeError::GuestLoad {
                name: name.to_string(),
                source,
            })?;
            guests.push(guest);

            host.attach(FrameRef::new(*name, guest_origin, Arc::new(host_port)))?;
        }

        Ok(Self { host, guests })
    }

    pub fn report(&self, scenario: Scenario) -> ScenarioReport {
        ScenarioReport {
            scenario,
            host: self.host.view(),
            guests: self
                .guests
                .iter()
                .map(|guest| (guest.name().to_string(), guest.view()))
                .collect(),
        }
    }

    pub fn shutdown(&self) {
        self.host.shutdown();
        for guest in &self.guests {
            guest.shutdown();
        }
    }
}

/// Run one scenario to completion: load, wait out the observation window,
/// report, tear down.
pub async fn run_scenario(config: &RuntimeConfig) -> Result<ScenarioReport, RuntimeError> {
    info!(scenario = %config.scenario, "Running scenario");
    let session = Session::load(config).await?;

    tokio::time::sleep(config.bridge.status.observation_window + SETTLE_MARGIN).await;

    let report = session.report(config.scenario);
    session.shutdown();
    info!(scenario = %config.scenario, guests = report.guests.len(), "Scenario finished");
    Ok(report)
}
