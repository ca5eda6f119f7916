//! # Bridge
//!
//! Handshake and session state machine built on a [`BridgeClient`].
//!
//! ## Handshake
//!
//! ```text
//! Host                                        Guest
//!  │ init(): NOT_STARTED → HANDSHAKING          │ init(): NOT_STARTED → HANDSHAKING
//!  │──── handshake-request { auth, data } ─────→│ store Context → READY
//!  │                                            │ notify on_context_update
//!  │←─────────── handshake-reply { data } ──────│
//!  │ store Context → READY                      │
//!  │ notify on_context_update                   │
//!  │                                            │
//!  │←──────────── event { ready } ──────────────│ ready()
//! ```
//!
//! Readiness is a separate signal: `ready()` only sends the `ready` event and
//! never changes [`BridgeState`].

mod handshake;
mod state;

pub use handshake::HandshakeAck;
pub use state::{BridgeInfo, BridgeState, Role};

use crate::client::{BridgeClient, ListenerResult, Listeners, RequestHandler, Subscription};
use crate::error::{BridgeError, BridgeResult};
use bridge_types::{Context, EnvelopeKind, ErrorCause, READY_EVENT};
use handshake::BridgeRouter;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Host-side construction options.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Context pushed to the guest in the handshake request
    pub context: Context,
}

impl HostOptions {
    pub fn new(context: Context) -> Self {
        Self { context }
    }
}

/// Guest-side construction options.
#[derive(Debug, Clone, Default)]
pub struct GuestOptions {
    /// Data returned to the host in the handshake reply. `Null` contributes nothing.
    pub data: Value,
}

impl GuestOptions {
    pub fn with_data(data: Value) -> Self {
        Self { data }
    }
}

/// One end of a host/guest session. Cheap to clone.
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<BridgeShared>,
}

pub(crate) struct BridgeShared {
    role: Role,
    client: BridgeClient,
    /// Host: the Context to push
    pushed: Option<Context>,
    /// Guest: data returned in the handshake reply
    contributed: Value,
    state: watch::Sender<BridgeState>,
    context: RwLock<Option<Arc<Context>>>,
    last_error: Mutex<Option<ErrorCause>>,
    context_observers: Listeners<Arc<Context>>,
    pub(crate) app_handler: RwLock<Option<Arc<dyn RequestHandler>>>,
    /// Serializes host handshakes
    init_lock: tokio::sync::Mutex<()>,
}

impl Bridge {
    /// Create the host end of a session.
    pub fn host(client: BridgeClient, options: HostOptions) -> Self {
        Self::build(Role::Host, client, Some(options.context), Value::Null)
    }

    /// Create the guest end of a session.
    pub fn guest(client: BridgeClient, options: GuestOptions) -> Self {
        Self::build(Role::Guest, client, None, options.data)
    }

    fn build(role: Role, client: BridgeClient, pushed: Option<Context>, contributed: Value) -> Self {
        let (state, _) = watch::channel(BridgeState::NotStarted);
        let shared = Arc::new(BridgeShared {
            role,
            client,
            pushed,
            contributed,
            state,
            context: RwLock::new(None),
            last_error: Mutex::new(None),
            context_observers: Listeners::new(),
            app_handler: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        });

        shared.client.set_request_handler(Arc::new(BridgeRouter {
            shared: Arc::downgrade(&shared),
        }));

        Self { shared }
    }

    /// Start the session.
    ///
    /// Host: sends the handshake request and resolves once the reply is
    /// stored. On failure the bridge stays in `HANDSHAKING`, the cause is
    /// recorded in `info().last_error`, and `init()` may be retried.
    ///
    /// Guest: starts accepting the host's handshake and returns immediately.
    pub async fn init(&self) -> BridgeResult<()> {
        if self.shared.client.is_closed() {
            return Err(BridgeError::Closed);
        }

        match self.shared.role {
            Role::Host => self.shared.handshake().await.map(|_| ()),
            Role::Guest => {
                self.shared.begin_handshaking();
                self.shared.client.start();
                debug!(bridge = %self.shared.client.label(), "Awaiting handshake");
                Ok(())
            }
        }
    }

    /// Signal that guest application logic is operational.
    ///
    /// Valid before, during or after the handshake.
    pub async fn ready(&self) -> BridgeResult<()> {
        if self.shared.role != Role::Guest {
            return Err(BridgeError::ProtocolViolation(
                "only a guest signals readiness".into(),
            ));
        }
        self.shared.client.send_event(READY_EVENT, Value::Null).await?;
        info!(bridge = %self.shared.client.label(), "Signalled ready");
        Ok(())
    }

    /// Application request to the peer. Fails with `NotReady` before `READY`.
    pub async fn request(&self, payload: Value) -> BridgeResult<Value> {
        self.request_with_timeout(payload, None).await
    }

    pub async fn request_with_timeout(
        &self,
        payload: Value,
        timeout: Option<Duration>,
    ) -> BridgeResult<Value> {
        let state = self.state();
        if !state.is_ready() {
            return Err(BridgeError::NotReady { state });
        }
        self.shared
            .client
            .send_request_with_timeout(EnvelopeKind::Request, payload, timeout)
            .await
    }

    /// Application event to the peer. `ready` is reserved for [`Bridge::ready`].
    pub async fn emit(&self, event: &str, data: Value) -> BridgeResult<()> {
        if event == READY_EVENT {
            return Err(BridgeError::ProtocolViolation(format!(
                "'{READY_EVENT}' is reserved, use ready()"
            )));
        }
        self.shared.client.send_event(event, data).await
    }

    /// Install the handler answering the peer's application requests.
    pub fn set_request_handler(&self, handler: Arc<dyn RequestHandler>) {
        *self.shared.app_handler.write() = Some(handler);
    }

    /// Listen for application events named `event`.
    pub fn on_event<F>(&self, event: &str, listener: F) -> Subscription
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        self.shared.client.on_event(event, listener)
    }

    /// Observe every successful handshake. Called once per handshake with the
    /// newly stored Context.
    pub fn on_context_update<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Arc<Context>) -> ListenerResult + Send + Sync + 'static,
    {
        let id = self.shared.context_observers.add(Arc::new(observer));
        let weak = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.context_observers.remove(id);
            }
        })
    }

    /// Wait until the bridge reaches `READY`.
    pub async fn wait_ready(&self, timeout: Duration) -> BridgeResult<()> {
        let mut rx = self.shared.state.subscribe();
        let outcome = tokio::time::timeout(timeout, rx.wait_for(BridgeState::is_ready))
            .await
            .map(|reached| reached.map(|_| ()));
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(BridgeError::Closed),
            Err(_) => Err(BridgeError::NotReady {
                state: self.state(),
            }),
        }
    }

    pub fn current_token(&self) -> BridgeResult<String> {
        Ok(self.current_context()?.token().to_string())
    }

    /// The negotiated Context. Fails with `NotReady` before `READY`.
    pub fn current_context(&self) -> BridgeResult<Arc<Context>> {
        let state = self.state();
        if !state.is_ready() {
            return Err(BridgeError::NotReady { state });
        }
        self.shared
            .context
            .read()
            .clone()
            .ok_or(BridgeError::NotReady { state })
    }

    pub fn info(&self) -> BridgeInfo {
        let context = self.shared.context.read().clone();
        BridgeInfo {
            role: self.shared.role,
            state: self.state(),
            has_context: context.is_some(),
            token_expires_at: context.map(|context| context.auth.expires_at),
            last_error: self.last_error(),
            last_violation: self.shared.client.last_violation(),
            pending_requests: self.shared.client.pending_count(),
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.shared.state.borrow()
    }

    /// Receiver observing every state change.
    pub fn watch_state(&self) -> watch::Receiver<BridgeState> {
        self.shared.state.subscribe()
    }

    pub fn last_error(&self) -> Option<ErrorCause> {
        self.shared.last_error.lock().clone()
    }

    pub fn role(&self) -> Role {
        self.shared.role
    }

    pub fn client(&self) -> &BridgeClient {
        &self.shared.client
    }

    /// Tear down the session: pending requests fail with `Cancelled`, all
    /// listeners and handlers are dropped.
    pub fn close(&self) {
        self.shared.client.close();
        self.shared.context_observers.clear();
        self.shared.app_handler.write().take();
        info!(
            bridge = %self.shared.client.label(),
            state = %self.state(),
            "Bridge closed"
        );
    }
}

impl BridgeShared {
    fn begin_handshaking(&self) {
        self.state.send_if_modified(|state| {
            if *state == BridgeState::NotStarted {
                *state = BridgeState::Handshaking;
                true
            } else {
                false
            }
        });
    }

    /// Host side of the handshake.
    async fn handshake(&self) -> BridgeResult<Arc<Context>> {
        let _guard = self.init_lock.lock().await;
        let Some(pushed) = self.pushed.clone() else {
            return Err(BridgeError::ProtocolViolation(
                "only a host initiates a handshake".into(),
            ));
        };

        self.begin_handshaking();
        self.client.start();
        info!(bridge = %self.client.label(), "Starting handshake");

        let payload = serde_json::to_value(&pushed)?;
        let outcome = self
            .client
            .send_request(EnvelopeKind::HandshakeRequest, payload)
            .await
            .and_then(HandshakeAck::from_payload);

        match outcome {
            Ok(ack) => {
                let negotiated = if ack.data.is_null() {
                    pushed
                } else {
                    pushed.with_data(ack.data)
                };
                Ok(self.install_context(negotiated))
            }
            Err(e) => {
                if !matches!(e, BridgeError::Cancelled | BridgeError::Closed) {
                    *self.last_error.lock() = Some(ErrorCause::with_message(
                        ErrorCause::HANDSHAKE_FAILED,
                        e.to_string(),
                    ));
                }
                warn!(
                    bridge = %self.client.label(),
                    error = %e,
                    "Handshake failed"
                );
                Err(e)
            }
        }
    }

    /// Guest side of the handshake: store the pushed Context and answer.
    fn accept_handshake(&self, payload: Value) -> Result<Value, ErrorCause> {
        if self.role != Role::Guest {
            return Err(ErrorCause::with_message(
                ErrorCause::HANDSHAKE_FAILED,
                "a host does not accept handshakes",
            ));
        }

        let context: Context = match serde_json::from_value(payload) {
            Ok(context) => context,
            Err(e) => {
                let cause = ErrorCause::with_message(ErrorCause::INVALID_CONTEXT, e.to_string());
                warn!(bridge = %self.client.label(), error = %cause, "Rejected handshake");
                *self.last_error.lock() = Some(cause.clone());
                return Err(cause);
            }
        };

        self.install_context(context);
        Ok(HandshakeAck::new(self.contributed.clone()).into_payload())
    }

    /// Replace the Context wholesale, enter `READY` and notify observers.
    fn install_context(&self, context: Context) -> Arc<Context> {
        let context = Arc::new(context);
        *self.context.write() = Some(Arc::clone(&context));
        self.last_error.lock().take();
        self.state.send_replace(BridgeState::Ready);

        info!(
            bridge = %self.client.label(),
            role = %self.role,
            expires_at = %context.auth.expires_at,
            "Handshake complete"
        );

        self.context_observers.notify("context_update", &context);
        context
    }
}
