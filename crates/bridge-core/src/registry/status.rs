//! # Connection Status
//!
//! Host-facing status of one guest connection, derived from two independent
//! guest signals: the `ready` event and the application event.
//!
//! ```text
//! window open                      → error: null
//! window closed, no app event      → error: { cause: "not_started" }
//! window closed, app event, !ready → error: { cause: "not_ready" }
//! app event and ready              → error: null
//! ```
//!
//! Signals arriving after the window closes re-evaluate the cause.

use bridge_types::ErrorCause;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

/// `{ ready, foo, error }` as shown to the host page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Guest emitted `ready`
    pub ready: bool,
    /// Last application event payload received from the guest
    #[serde(rename = "foo")]
    pub payload: Option<Value>,
    pub error: Option<ErrorCause>,
}

#[derive(Debug, Default)]
struct Signals {
    ready: bool,
    payload: Option<Value>,
    window_closed: bool,
}

impl Signals {
    fn derive(&self) -> ConnectionStatus {
        let error = if !self.window_closed {
            None
        } else if self.payload.is_none() {
            Some(ErrorCause::not_started())
        } else if !self.ready {
            Some(ErrorCause::not_ready())
        } else {
            None
        };

        ConnectionStatus {
            ready: self.ready,
            payload: self.payload.clone(),
            error,
        }
    }
}

/// Folds guest signals into a [`ConnectionStatus`] and publishes every change.
pub struct StatusTracker {
    signals: Mutex<Signals>,
    tx: watch::Sender<ConnectionStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionStatus::default());
        Self {
            signals: Mutex::new(Signals::default()),
            tx,
        }
    }

    /// The guest emitted `ready`.
    pub fn mark_ready(&self) {
        self.update(|signals| signals.ready = true);
    }

    /// The guest emitted the application event.
    pub fn record_payload(&self, payload: Value) {
        self.update(|signals| signals.payload = Some(payload));
    }

    /// The observation window elapsed; missing signals now count as errors.
    pub fn close_window(&self) {
        self.update(|signals| signals.window_closed = true);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    fn update(&self, apply: impl FnOnce(&mut Signals)) {
        let mut signals = self.signals.lock();
        apply(&mut signals);
        let status = signals.derive();
        // Published under the lock so observers see changes in order
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
