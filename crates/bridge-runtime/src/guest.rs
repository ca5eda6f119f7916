//! Guest page: one bridge plus the data it renders.

use crate::scenario::GuestBehavior;
use bridge_core::{Bridge, BridgeClient, BridgeConfig, BridgeResult, GuestOptions, Subscription};
use bridge_transport::Transport;
use bridge_types::{Credential, Origin};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What the guest page shows: `{ auth, myResponse, foo }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestView {
    pub auth: Option<Credential>,
    /// Host's reply to the guest's `{ a: 0, b: 1 }` request
    pub my_response: Option<Value>,
    /// Payload of the host's application event
    pub foo: Option<Value>,
}

impl GuestView {
    /// Every field populated.
    pub fn is_complete(&self) -> bool {
        self.auth.is_some() && self.my_response.is_some() && self.foo.is_some()
    }
}

pub struct GuestApp {
    name: String,
    bridge: Bridge,
    view: Arc<watch::Sender<GuestView>>,
    subscriptions: Mutex<Vec<Subscription>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl GuestApp {
    /// Load the guest page: build its bridge, register listeners and start
    /// accepting the host's handshake.
    pub async fn start(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        host_origin: Origin,
        behavior: GuestBehavior,
        config: &BridgeConfig,
    ) -> BridgeResult<Self> {
        let name = name.into();
        let app_event = config.status.app_event.clone();
        let client = BridgeClient::new(
            format!("guest/{name}"),
            transport,
            host_origin,
            config.client.clone(),
        )?;
        let bridge = Bridge::guest(client, GuestOptions::default());
        let (view, _) = watch::channel(GuestView::default());
        let view = Arc::new(view);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let hello_subscription = {
            let view = Arc::clone(&view);
            bridge.on_event(&app_event, move |data| {
                let data = data.clone();
                view.send_modify(|view| view.foo = Some(data));
                Ok(())
            })
        };
        let context_subscription = {
            let view = Arc::clone(&view);
            bridge.on_context_update(move |context| {
                let auth = context.auth.clone();
                view.send_modify(|view| view.auth = Some(auth));
                // Driver gone means the page is shutting down
                let _ = updates_tx.send(());
                Ok(())
            })
        };

        let driver = tokio::spawn(drive(
            name.clone(),
            app_event,
            bridge.clone(),
            Arc::clone(&view),
            behavior,
            updates_rx,
        ));

        bridge.init().await?;
        info!(guest = %name, "Guest page loaded");

        Ok(Self {
            name,
            bridge,
            view,
            subscriptions: Mutex::new(vec![hello_subscription, context_subscription]),
            driver: Mutex::new(Some(driver)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn view(&self) -> GuestView {
        self.view.borrow().clone()
    }

    /// Wait until the view is fully populated, returning whatever it holds
    /// after `timeout` otherwise.
    pub async fn wait_for_view(&self, timeout: Duration) -> GuestView {
        let mut rx = self.view.subscribe();
        let _ = tokio::time::timeout(timeout, rx.wait_for(GuestView::is_complete)).await;
        self.view()
    }

    pub fn shutdown(&self) {
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
        self.subscriptions.lock().clear();
        self.bridge.close();
    }
}

/// Per handshake: ask the host for `0 + 1`. After the first one, greet the
/// host and signal readiness as the behavior allows.
async fn drive(
    name: String,
    app_event: String,
    bridge: Bridge,
    view: Arc<watch::Sender<GuestView>>,
    behavior: GuestBehavior,
    mut updates: mpsc::UnboundedReceiver<()>,
) {
    let mut greeted = false;

    while updates.recv().await.is_some() {
        match bridge.request(json!({ "a": 0, "b": 1 })).await {
            Ok(reply) => view.send_modify(|view| view.my_response = Some(reply)),
            Err(e) => warn!(guest = %name, error = %e, "Request to host failed"),
        }

        if greeted {
            continue;
        }
        greeted = true;

        if behavior.send_hello {
            let hello = json!({ "sender": name, "value": "hello to my host" });
            if let Err(e) = bridge.emit(&app_event, hello).await {
                warn!(guest = %name, error = %e, "Could not greet host");
            }
        }
        if behavior.send_ready {
            if let Err(e) = bridge.ready().await {
                warn!(guest = %name, error = %e, "Could not signal ready");
            }
        }
    }
}
