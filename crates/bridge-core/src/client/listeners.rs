//! # Listener Registries
//!
//! Ordered listener lists. Every listener runs independently: an error or a
//! panic in one is logged and does not stop the others.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Error type a listener may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by a listener.
pub type ListenerResult = Result<(), ListenerError>;

/// A listener callback.
pub type Listener<T> = Arc<dyn Fn(&T) -> ListenerResult + Send + Sync>;

/// Outcome of one notification round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Listeners invoked.
    pub invoked: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
}

/// Listeners for one value type, invoked in registration order.
pub struct Listeners<T> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(u64, Listener<T>)>>,
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener; returns its id.
    pub fn add(&self, listener: Listener<T>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push((id, listener));
        id
    }

    /// Remove a listener by id.
    pub fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Invoke every listener with `value`.
    ///
    /// The list is snapshotted first so listeners may (un)register freely.
    pub fn notify(&self, label: &str, value: &T) -> NotifyReport {
        let snapshot: Vec<Listener<T>> = self
            .entries
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut report = NotifyReport::default();
        for listener in snapshot {
            report.invoked += 1;
            match catch_unwind(AssertUnwindSafe(|| listener(value))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(listener = label, error = %e, "Listener failed");
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(listener = label, "Listener panicked");
                }
            }
        }
        report
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Event listeners keyed by event name.
#[derive(Default)]
pub struct EventListeners {
    by_event: RwLock<HashMap<String, Arc<Listeners<Value>>>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `event`; returns its id.
    pub fn add(&self, event: &str, listener: Listener<Value>) -> u64 {
        let listeners = {
            let mut by_event = self.by_event.write();
            Arc::clone(by_event.entry(event.to_string()).or_default())
        };
        listeners.add(listener)
    }

    pub fn remove(&self, event: &str, id: u64) -> bool {
        let listeners = self.by_event.read().get(event).cloned();
        listeners.is_some_and(|listeners| listeners.remove(id))
    }

    /// Invoke all listeners registered for `event`.
    pub fn emit(&self, event: &str, data: &Value) -> NotifyReport {
        let listeners = self.by_event.read().get(event).cloned();
        match listeners {
            Some(listeners) => listeners.notify(event, data),
            None => NotifyReport::default(),
        }
    }

    /// Listeners registered for `event`.
    pub fn count(&self, event: &str) -> usize {
        self.by_event
            .read()
            .get(event)
            .map_or(0, |listeners| listeners.len())
    }

    pub fn clear(&self) {
        self.by_event.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_registration_order() {
        let listeners = EventListeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let seen = Arc::clone(&seen);
            listeners.add(
                "hello",
                Arc::new(move |_: &Value| -> ListenerResult {
                    seen.lock().push(n);
                    Ok(())
                }),
            );
        }

        let report = listeners.emit("hello", &json!(null));
        assert_eq!(report.invoked, 3);
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failures_do_not_stop_others() {
        let listeners = EventListeners::new();
        let reached = Arc::new(Mutex::new(0));

        listeners.add("hello", Arc::new(|_: &Value| -> ListenerResult { Err("nope".into()) }));
        listeners.add("hello", Arc::new(|_: &Value| -> ListenerResult { panic!("listener exploded") }));
        {
            let reached = Arc::clone(&reached);
            listeners.add(
                "hello",
                Arc::new(move |_: &Value| -> ListenerResult {
                    *reached.lock() += 1;
                    Ok(())
                }),
            );
        }

        let report = listeners.emit("hello", &json!({ "value": 1 }));
        assert_eq!(report, NotifyReport { invoked: 3, failed: 2 });
        assert_eq!(*reached.lock(), 1);
    }

    #[test]
    fn test_events_are_isolated_by_name() {
        let listeners = EventListeners::new();
        listeners.add("ready", Arc::new(|_: &Value| -> ListenerResult { Ok(()) }));

        assert_eq!(listeners.emit("hello", &Value::Null).invoked, 0);
        assert_eq!(listeners.count("ready"), 1);
    }

    #[test]
    fn test_remove() {
        let listeners = EventListeners::new();
        let id = listeners.add("ready", Arc::new(|_: &Value| -> ListenerResult { Ok(()) }));

        assert!(listeners.remove("ready", id));
        assert!(!listeners.remove("ready", id));
        assert!(!listeners.remove("missing", id));
        assert_eq!(listeners.count("ready"), 0);
    }
}
