//! One host-side guest connection.

use super::status::{ConnectionStatus, StatusTracker};
use super::FrameRef;
use crate::bridge::{Bridge, HostOptions};
use crate::client::{BridgeClient, RequestHandler, Subscription};
use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use bridge_types::{Context, FrameId, Origin, READY_EVENT};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A host↔guest session: its own client, bridge, Context and status.
pub struct Connection {
    frame_id: FrameId,
    origin: Origin,
    bridge: Bridge,
    status: Arc<StatusTracker>,
    subscriptions: Mutex<Vec<Subscription>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    attached_at: DateTime<Utc>,
}

impl Connection {
    /// Build the connection and start its handshake and observation window.
    ///
    /// Returns as soon as the background tasks are spawned; must run inside a
    /// tokio runtime.
    pub(crate) fn open(
        frame: FrameRef,
        context: Context,
        config: &BridgeConfig,
        handler: Option<Arc<dyn RequestHandler>>,
    ) -> BridgeResult<Arc<Self>> {
        let FrameRef {
            id: frame_id,
            origin,
            transport,
        } = frame;

        let client = BridgeClient::new(
            format!("host/{frame_id}"),
            transport,
            origin.clone(),
            config.client.clone(),
        )?;
        let bridge = Bridge::host(client, HostOptions::new(context));
        if let Some(handler) = handler {
            bridge.set_request_handler(handler);
        }

        let status = Arc::new(StatusTracker::new());

        // Listeners go in before init() starts dispatch
        let ready_subscription = {
            let status = Arc::clone(&status);
            let frame_id = frame_id.clone();
            bridge.on_event(READY_EVENT, move |_| {
                info!(frame = %frame_id, "Guest ready");
                status.mark_ready();
                Ok(())
            })
        };
        let app_subscription = {
            let status = Arc::clone(&status);
            bridge.on_event(&config.status.app_event, move |data| {
                status.record_payload(data.clone());
                Ok(())
            })
        };

        let handshake = {
            let bridge = bridge.clone();
            let frame_id = frame_id.clone();
            tokio::spawn(async move {
                match bridge.init().await {
                    Ok(()) => debug!(frame = %frame_id, "Handshake task finished"),
                    Err(e) => warn!(frame = %frame_id, error = %e, "Handshake task failed"),
                }
            })
        };

        let window = {
            let status = Arc::clone(&status);
            let frame_id = frame_id.clone();
            let observation_window = config.status.observation_window;
            tokio::spawn(async move {
                tokio::time::sleep(observation_window).await;
                status.close_window();
                debug!(
                    frame = %frame_id,
                    window_ms = observation_window.as_millis(),
                    "Observation window closed"
                );
            })
        };

        Ok(Arc::new(Self {
            frame_id,
            origin,
            bridge,
            status,
            subscriptions: Mutex::new(vec![ready_subscription, app_subscription]),
            tasks: Mutex::new(vec![handshake, window]),
            attached_at: Utc::now(),
        }))
    }

    pub fn frame_id(&self) -> &FrameId {
        &self.frame_id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn attached_at(&self) -> DateTime<Utc> {
        self.attached_at
    }

    /// Host-facing `{ ready, foo, error }`.
    pub fn status(&self) -> ConnectionStatus {
        self.status.status()
    }

    /// Receiver observing every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Handshake complete and the guest has signalled `ready`.
    pub fn is_operational(&self) -> bool {
        self.bridge.state().is_ready() && self.status.status().ready
    }

    /// Cancel outstanding requests, drop listeners and stop background tasks.
    pub(crate) fn close(&self) {
        self.bridge.close();
        self.subscriptions.lock().clear();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("frame_id", &self.frame_id)
            .field("origin", &self.origin)
            .field("state", &self.bridge.state())
            .field("status", &self.status.status())
            .finish()
    }
}
