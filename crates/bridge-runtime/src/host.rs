//! Host page: attaches guest frames and answers their requests.

use bridge_core::{
    handler_fn, BridgeConfig, Connection, ConnectionRegistry, ConnectionStatus, FrameRef,
    RegistryError,
};
use bridge_types::{Context, ErrorCause, FrameId};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Sender name the host puts in its replies and greetings.
pub const HOST_SENDER: &str = "host";

#[derive(Debug, Deserialize)]
struct SumRequest {
    a: i64,
    b: i64,
}

/// Answer `{ a, b }` with `{ sum, sender }`.
pub fn sum_reply(payload: Value) -> Result<Value, ErrorCause> {
    let request: SumRequest = serde_json::from_value(payload)
        .map_err(|e| ErrorCause::with_message("invalid_request", e.to_string()))?;
    let sum = request
        .a
        .checked_add(request.b)
        .ok_or_else(|| ErrorCause::with_message("invalid_request", "sum overflows"))?;
    Ok(json!({ "sum": sum, "sender": HOST_SENDER }))
}

pub struct HostApp {
    registry: Arc<ConnectionRegistry>,
    app_event: String,
    greeters: Mutex<Vec<JoinHandle<()>>>,
}

impl HostApp {
    pub fn new(context: Context, config: BridgeConfig) -> Self {
        let app_event = config.status.app_event.clone();
        let registry = ConnectionRegistry::new(context, config);
        registry.set_request_handler(handler_fn(|payload: Value| async move {
            sum_reply(payload)
        }));

        Self {
            registry: Arc::new(registry),
            app_event,
            greeters: Mutex::new(Vec::new()),
        }
    }

    /// Attach a guest frame. Once its handshake completes the host greets it
    /// with the application event. Must run inside a tokio runtime.
    pub fn attach(&self, frame: FrameRef) -> Result<Arc<Connection>, RegistryError> {
        let connection = self.registry.attach(frame)?;
        let timeout = self.registry.config().client.request_timeout;

        let greeter = {
            let connection = Arc::clone(&connection);
            let app_event = self.app_event.clone();
            tokio::spawn(async move {
                let frame_id = connection.frame_id().clone();
                let bridge = connection.bridge();
                if let Err(e) = bridge.wait_ready(timeout).await {
                    warn!(frame = %frame_id, error = %e, "Guest never completed handshake");
                    return;
                }

                let hello = json!({
                    "sender": HOST_SENDER,
                    "value": format!("hello to my guest {frame_id}"),
                });
                match bridge.emit(&app_event, hello).await {
                    Ok(()) => info!(frame = %frame_id, "Greeted guest"),
                    Err(e) => warn!(frame = %frame_id, error = %e, "Could not greet guest"),
                }
            })
        };
        self.greeters.lock().push(greeter);

        Ok(connection)
    }

    pub fn connection(&self, frame_id: &FrameId) -> Option<Arc<Connection>> {
        self.registry.get(frame_id)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Status of every attached guest, keyed by frame id.
    pub fn view(&self) -> BTreeMap<FrameId, ConnectionStatus> {
        self.registry.statuses()
    }

    pub fn shutdown(&self) {
        for greeter in self.greeters.lock().drain(..) {
            greeter.abort();
        }
        let closed = self.registry.detach_all();
        info!(closed = closed, "Host page closed");
    }
}
