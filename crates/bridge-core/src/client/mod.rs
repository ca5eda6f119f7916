//! # Bridge Client
//!
//! Low-level request/reply/event primitive over one transport endpoint.
//!
//! ```text
//!            send_request ──► PendingRequestStore ──► transport.post
//!                                   ▲
//! transport ──► dispatch loop ──────┤ reply / handshake-reply
//!                    │
//!                    ├── request / handshake-request ──► RequestHandler ──► auto reply
//!                    └── event ──► EventListeners (registration order)
//! ```
//!
//! The client knows nothing about handshakes; it only correlates and
//! demultiplexes. Every inbound delivery is checked against the expected peer
//! origin before anything acts on it.

mod handler;
mod ledger;
mod listeners;
mod pending;
mod subscription;

pub use handler::{handler_fn, FnHandler, RequestHandler};
pub use ledger::{InboundLedger, LedgerError};
pub use listeners::{
    EventListeners, Listener, ListenerError, ListenerResult, Listeners, NotifyReport,
};
pub use pending::{cleanup_task, Completion, PendingRequestStore, PendingStats};
pub use subscription::Subscription;

use crate::config::ClientConfig;
use crate::error::{BridgeError, BridgeResult};
use bridge_transport::{Delivery, InboundStream, Transport, TransportError};
use bridge_types::{CorrelationId, Envelope, EnvelopeKind, ErrorCause, EventMessage, Origin};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Traffic counters for one client.
#[derive(Debug, Default)]
pub struct ClientStats {
    pub requests_sent: AtomicU64,
    pub requests_received: AtomicU64,
    pub replies_sent: AtomicU64,
    pub events_sent: AtomicU64,
    pub events_received: AtomicU64,
    /// Late or duplicate replies dropped without effect
    pub replies_discarded: AtomicU64,
    pub protocol_violations: AtomicU64,
}

/// Request/reply/event client for one connection endpoint.
///
/// Cheap to clone; clones share the same endpoint.
#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    /// Label used in logs, e.g. `host/alice`
    label: String,
    transport: Arc<dyn Transport>,
    /// Origin every inbound delivery must come from
    peer_origin: Origin,
    config: ClientConfig,
    pending: Arc<PendingRequestStore>,
    ledger: Mutex<InboundLedger>,
    handler: RwLock<Option<Arc<dyn RequestHandler>>>,
    listeners: EventListeners,
    stats: ClientStats,
    last_violation: Mutex<Option<String>>,
    /// Inbound stream until `start` claims it
    inbound: Mutex<Option<InboundStream>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// In-flight request handler runs, aborted on close
    handlers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl BridgeClient {
    /// Create a client over `transport`, accepting traffic only from `peer_origin`.
    ///
    /// Fails with `TransportError::InboundTaken` if another client already owns
    /// the endpoint.
    pub fn new(
        label: impl Into<String>,
        transport: Arc<dyn Transport>,
        peer_origin: Origin,
        config: ClientConfig,
    ) -> BridgeResult<Self> {
        let inbound = transport
            .take_inbound()
            .ok_or(BridgeError::Transport(TransportError::InboundTaken))?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                label: label.into(),
                transport,
                peer_origin,
                config,
                pending: Arc::new(PendingRequestStore::new()),
                ledger: Mutex::new(InboundLedger::new()),
                handler: RwLock::new(None),
                listeners: EventListeners::new(),
                stats: ClientStats::default(),
                last_violation: Mutex::new(None),
                inbound: Mutex::new(Some(inbound)),
                tasks: Mutex::new(Vec::new()),
                handlers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Start the dispatch loop. Idempotent; must run inside a tokio runtime.
    ///
    /// Inbound traffic queues in the transport until this is called.
    pub fn start(&self) {
        if self.is_closed() {
            return;
        }
        let Some(stream) = self.inner.inbound.lock().take() else {
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let mut tasks = self.inner.tasks.lock();
        tasks.push(tokio::spawn(dispatch_loop(weak, stream)));

        if let Some(interval) = self.inner.config.sweep_interval {
            tasks.push(tokio::spawn(cleanup_task(
                Arc::clone(&self.inner.pending),
                interval,
            )));
        }

        debug!(client = %self.inner.label, "Dispatch loop started");
    }

    /// Send a request and suspend until its reply or the default timeout.
    pub async fn send_request(&self, kind: EnvelopeKind, payload: Value) -> BridgeResult<Value> {
        self.send_request_with_timeout(kind, payload, None).await
    }

    /// Send a request with an explicit timeout.
    ///
    /// `kind` must be `request` or `handshake-request`.
    pub async fn send_request_with_timeout(
        &self,
        kind: EnvelopeKind,
        payload: Value,
        timeout: Option<Duration>,
    ) -> BridgeResult<Value> {
        if !kind.is_request() {
            return Err(BridgeError::ProtocolViolation(format!(
                "cannot send a request of kind {kind}"
            )));
        }
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }

        let inner = &self.inner;
        let timeout = timeout.unwrap_or(inner.config.request_timeout);
        let (correlation_id, rx) = inner.pending.register(kind, timeout);

        // close() may have drained the table between the check and register
        if self.is_closed() {
            inner.pending.cancel(&correlation_id);
            return Err(BridgeError::Cancelled);
        }

        let envelope = Envelope::request(kind, correlation_id, payload);
        if let Err(e) = inner.post(&envelope).await {
            inner.pending.cancel(&correlation_id);
            return Err(e);
        }
        inner.stats.requests_sent.fetch_add(1, Ordering::Relaxed);

        debug!(
            client = %inner.label,
            correlation_id = %correlation_id,
            kind = %kind,
            "Sent request"
        );

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(BridgeError::Cancelled),
            Err(_) => {
                inner.pending.expire(&correlation_id);
                warn!(
                    client = %inner.label,
                    correlation_id = %correlation_id,
                    timeout_ms = timeout.as_millis(),
                    "Request timed out"
                );
                Err(BridgeError::RequestTimeout {
                    correlation_id,
                    timeout,
                })
            }
        }
    }

    /// Reply to an inbound request.
    ///
    /// Replying twice, or to an id that never arrived, is a protocol violation:
    /// nothing is sent and the error is returned.
    pub async fn send_reply(
        &self,
        correlation_id: CorrelationId,
        outcome: Result<Value, ErrorCause>,
    ) -> BridgeResult<()> {
        self.inner.send_reply(correlation_id, outcome).await
    }

    /// Fire-and-forget event.
    pub async fn send_event(&self, event: &str, data: Value) -> BridgeResult<()> {
        let envelope = Envelope::event(EventMessage::new(event, data));
        self.inner.post(&envelope).await?;
        self.inner.stats.events_sent.fetch_add(1, Ordering::Relaxed);
        debug!(client = %self.inner.label, event = event, "Sent event");
        Ok(())
    }

    /// Install the handler answering inbound requests (replacing any previous one).
    pub fn set_request_handler(&self, handler: Arc<dyn RequestHandler>) {
        *self.inner.handler.write() = Some(handler);
    }

    /// Register a listener for inbound events named `event`.
    pub fn on_event<F>(&self, event: &str, listener: F) -> Subscription
    where
        F: Fn(&Value) -> ListenerResult + Send + Sync + 'static,
    {
        let id = self.inner.listeners.add(event, Arc::new(listener));
        let weak: Weak<ClientInner> = Arc::downgrade(&self.inner);
        let event = event.to_string();
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.remove(&event, id);
            }
        })
    }

    /// Tear down: stop dispatch, reject pending requests with `Cancelled`,
    /// drop listeners and the handler. Later sends fail with `Closed`.
    pub fn close(&self) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        for task in inner.tasks.lock().drain(..) {
            task.abort();
        }
        let interrupted = inner.handlers.lock().drain(..).fold(0, |count, run| {
            let running = !run.is_finished();
            run.abort();
            count + usize::from(running)
        });
        inner.inbound.lock().take();

        let cancelled = inner.pending.cancel_all();
        inner.listeners.clear();
        inner.handler.write().take();
        inner.ledger.lock().clear();

        info!(
            client = %inner.label,
            cancelled = cancelled,
            interrupted_handlers = interrupted,
            "Client closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Outstanding outbound requests.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.pending_count()
    }

    /// Inbound requests still owed a reply.
    pub fn awaiting_reply_count(&self) -> usize {
        self.inner.ledger.lock().len()
    }

    pub fn stats(&self) -> &ClientStats {
        &self.inner.stats
    }

    pub fn pending_stats(&self) -> &PendingStats {
        self.inner.pending.stats()
    }

    /// Most recent protocol violation, if any.
    pub fn last_violation(&self) -> Option<String> {
        self.inner.last_violation.lock().clone()
    }

    pub fn peer_origin(&self) -> &Origin {
        &self.inner.peer_origin
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// True if both handles share one endpoint.
    pub fn same_endpoint(&self, other: &BridgeClient) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ClientInner {
    async fn post(&self, envelope: &Envelope) -> BridgeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::Closed);
        }
        let text = envelope.encode()?;
        self.transport.post(text).await?;
        Ok(())
    }

    async fn send_reply(
        &self,
        correlation_id: CorrelationId,
        outcome: Result<Value, ErrorCause>,
    ) -> BridgeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::Closed);
        }
        let taken = self.ledger.lock().take(correlation_id);
        let reply_kind = match taken {
            Ok(kind) => kind,
            Err(e) => {
                let detail = e.to_string();
                self.record_violation(&detail);
                return Err(BridgeError::ProtocolViolation(detail));
            }
        };

        let envelope = Envelope::reply(reply_kind, correlation_id, outcome);
        self.post(&envelope).await?;
        self.stats.replies_sent.fetch_add(1, Ordering::Relaxed);

        debug!(
            client = %self.label,
            correlation_id = %correlation_id,
            kind = %reply_kind,
            "Sent reply"
        );
        Ok(())
    }

    fn record_violation(&self, detail: &str) {
        if self.closed.load(Ordering::SeqCst) {
            debug!(client = %self.label, violation = detail, "Ignoring violation after close");
            return;
        }
        self.stats.protocol_violations.fetch_add(1, Ordering::Relaxed);
        warn!(client = %self.label, violation = detail, "Protocol violation");
        *self.last_violation.lock() = Some(detail.to_string());
    }

    /// Route one inbound delivery.
    fn dispatch(self: &Arc<Self>, delivery: Delivery) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        if delivery.origin != self.peer_origin {
            self.record_violation(&format!(
                "origin mismatch: expected {}, got {}",
                self.peer_origin, delivery.origin
            ));
            return;
        }

        let envelope = match Envelope::decode(&delivery.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.record_violation(&e.to_string());
                return;
            }
        };

        match envelope.kind {
            kind if kind.is_request() => self.handle_request(envelope),
            kind if kind.is_reply() => self.handle_reply(envelope),
            _ => self.handle_event(envelope),
        }
    }

    fn handle_request(self: &Arc<Self>, envelope: Envelope) {
        let kind = envelope.kind;
        let Some(correlation_id) = envelope.correlation_id else {
            self.record_violation(&format!("{kind} without correlation id"));
            return;
        };

        if let Err(e) = self.ledger.lock().record(correlation_id, kind) {
            self.record_violation(&e.to_string());
            return;
        }
        self.stats.requests_received.fetch_add(1, Ordering::Relaxed);

        let handler = self.handler.read().clone();
        let inner = Arc::clone(self);
        let payload = envelope.payload;

        // Handlers may await their own requests to the peer, so they must not
        // block the dispatch loop.
        let mut handlers = self.handlers.lock();
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        handlers.retain(|run| !run.is_finished());
        handlers.push(tokio::spawn(async move {
            let outcome = match handler {
                Some(handler) => AssertUnwindSafe(handler.handle(kind, payload))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        warn!(
                            client = %inner.label,
                            correlation_id = %correlation_id,
                            "Request handler panicked"
                        );
                        Err(ErrorCause::with_message(
                            ErrorCause::HANDLER_FAILED,
                            "handler panicked",
                        ))
                    }),
                None => Err(ErrorCause::new(ErrorCause::HANDLER_MISSING)),
            };

            if let Err(e) = inner.send_reply(correlation_id, outcome).await {
                debug!(
                    client = %inner.label,
                    correlation_id = %correlation_id,
                    error = %e,
                    "Automatic reply not sent"
                );
            }
        }));
    }

    fn handle_reply(&self, envelope: Envelope) {
        let kind = envelope.kind;
        let Some(correlation_id) = envelope.correlation_id else {
            self.record_violation(&format!("{kind} without correlation id"));
            return;
        };

        match self
            .pending
            .complete(correlation_id, kind, envelope.into_outcome())
        {
            Completion::Delivered | Completion::CallerGone => {}
            Completion::Unknown => {
                self.stats.replies_discarded.fetch_add(1, Ordering::Relaxed);
                debug!(
                    client = %self.label,
                    correlation_id = %correlation_id,
                    "Late or duplicate reply discarded"
                );
            }
            Completion::KindMismatch => {
                self.record_violation(&format!(
                    "{kind} does not answer request {correlation_id}"
                ));
            }
        }
    }

    fn handle_event(&self, envelope: Envelope) {
        let message = match EventMessage::from_payload(envelope.payload) {
            Ok(message) => message,
            Err(e) => {
                self.record_violation(&e.to_string());
                return;
            }
        };
        self.stats.events_received.fetch_add(1, Ordering::Relaxed);

        let report = self.listeners.emit(&message.event, &message.data);
        debug!(
            client = %self.label,
            event = %message.event,
            listeners = report.invoked,
            failed = report.failed,
            "Event dispatched"
        );
    }
}

async fn dispatch_loop(inner: Weak<ClientInner>, mut stream: InboundStream) {
    while let Some(delivery) = stream.next().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.dispatch(delivery);
    }
    debug!("Dispatch loop finished");
}
