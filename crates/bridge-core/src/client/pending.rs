//! Pending Request Table - maps correlation ids to suspended callers.
//!
//! Flow:
//! 1. `send_request` calls `register()` to get a fresh id and a oneshot receiver
//! 2. The request envelope goes out with that id
//! 3. The dispatch loop sees the reply and calls `complete()`
//! 4. The caller awaits the receiver or times out and calls `expire()`

use crate::error::BridgeError;
use bridge_types::{CorrelationId, EnvelopeKind, ErrorCause};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Outcome delivered to a suspended caller.
pub type PendingOutcome = Result<Value, BridgeError>;

/// A caller waiting for its reply
struct PendingRequest {
    /// Channel resuming the caller
    sender: oneshot::Sender<PendingOutcome>,
    /// When the request was registered
    created_at: Instant,
    /// Kind of the outbound request
    kind: EnvelopeKind,
    /// Deadline for this request
    timeout: Duration,
}

/// Result of matching an inbound reply against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Reply delivered to its caller.
    Delivered,
    /// Entry matched but the caller had already gone away.
    CallerGone,
    /// No entry for this id: late or duplicate reply.
    Unknown,
    /// Entry exists but the reply kind does not answer its request kind.
    KindMismatch,
}

/// Statistics for the pending request table
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total requests registered
    pub total_registered: AtomicU64,
    /// Total requests completed by a reply
    pub total_completed: AtomicU64,
    /// Total requests timed out
    pub total_timeouts: AtomicU64,
    /// Total requests cancelled
    pub total_cancelled: AtomicU64,
}

/// Pending request table, owned by exactly one client.
pub struct PendingRequestStore {
    pending: DashMap<CorrelationId, PendingRequest>,
    stats: Arc<PendingStats>,
}

impl PendingRequestStore {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register a pending request and get a receiver for its outcome.
    ///
    /// Fresh ids are drawn until one is not in flight, so ids are never reused
    /// concurrently.
    pub fn register(
        &self,
        kind: EnvelopeKind,
        timeout: Duration,
    ) -> (CorrelationId, oneshot::Receiver<PendingOutcome>) {
        let (tx, rx) = oneshot::channel();
        let request = PendingRequest {
            sender: tx,
            created_at: Instant::now(),
            kind,
            timeout,
        };

        let correlation_id = loop {
            let candidate = CorrelationId::new();
            if let Entry::Vacant(slot) = self.pending.entry(candidate) {
                slot.insert(request);
                break candidate;
            }
        };

        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(correlation_id = %correlation_id, kind = %kind, "Registered pending request");

        (correlation_id, rx)
    }

    /// Complete a pending request with the reply's outcome.
    pub fn complete(
        &self,
        correlation_id: CorrelationId,
        reply_kind: EnvelopeKind,
        outcome: Result<Value, ErrorCause>,
    ) -> Completion {
        let removed = self.pending.remove_if(&correlation_id, |_, pending| {
            pending.kind.reply_kind() == Some(reply_kind)
        });

        let Some((_, pending)) = removed else {
            return if self.pending.contains_key(&correlation_id) {
                Completion::KindMismatch
            } else {
                Completion::Unknown
            };
        };

        let elapsed = pending.created_at.elapsed();
        match pending.sender.send(outcome.map_err(BridgeError::Remote)) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    kind = %pending.kind,
                    response_time_ms = elapsed.as_millis(),
                    "Completed pending request"
                );
                Completion::Delivered
            }
            Err(_) => {
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(correlation_id = %correlation_id, "Pending request caller dropped");
                Completion::CallerGone
            }
        }
    }

    /// Drop an entry whose caller timed out.
    pub fn expire(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Remove one entry without resolving it (send failure path).
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Reject every outstanding request with `Cancelled`.
    ///
    /// Returns the number of callers resumed.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut cancelled = 0;

        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.sender.send(Err(BridgeError::Cancelled));
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                cancelled += 1;
            }
        }

        cancelled
    }

    /// Fail entries past their deadline with `RequestTimeout`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|entry| now.duration_since(entry.created_at) > entry.timeout)
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for id in expired {
            let Some((_, request)) = self.pending.remove(&id) else {
                continue;
            };
            warn!(
                correlation_id = %id,
                kind = %request.kind,
                elapsed_ms = now.duration_since(request.created_at).as_millis(),
                timeout_ms = request.timeout.as_millis(),
                "Removing expired pending request"
            );
            let _ = request.sender.send(Err(BridgeError::RequestTimeout {
                correlation_id: id,
                timeout: request.timeout,
            }));
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
            removed += 1;
        }

        removed
    }

    /// Number of requests currently awaiting a reply
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a correlation ID is pending
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

impl Default for PendingRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task sweeping abandoned entries.
pub async fn cleanup_task(store: Arc<PendingRequestStore>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = store.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired pending requests");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_complete() {
        let store = PendingRequestStore::new();

        let (id, rx) = store.register(EnvelopeKind::Request, Duration::from_secs(5));
        assert!(store.is_pending(&id));

        let completion = store.complete(id, EnvelopeKind::Reply, Ok(json!({ "sum": 3 })));
        assert_eq!(completion, Completion::Delivered);

        assert_eq!(rx.await.unwrap().unwrap(), json!({ "sum": 3 }));
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_error_is_delivered() {
        let store = PendingRequestStore::new();
        let (id, rx) = store.register(EnvelopeKind::Request, Duration::from_secs(5));

        store.complete(id, EnvelopeKind::Reply, Err(ErrorCause::new("boom")));

        match rx.await.unwrap() {
            Err(BridgeError::Remote(cause)) => assert_eq!(cause.cause, "boom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_reply_is_unknown() {
        let store = PendingRequestStore::new();
        let (id, _rx) = store.register(EnvelopeKind::Request, Duration::from_secs(5));

        assert_eq!(
            store.complete(id, EnvelopeKind::Reply, Ok(Value::Null)),
            Completion::Delivered
        );
        assert_eq!(
            store.complete(id, EnvelopeKind::Reply, Ok(Value::Null)),
            Completion::Unknown
        );
    }

    #[tokio::test]
    async fn test_reply_kind_must_match() {
        let store = PendingRequestStore::new();
        let (id, _rx) = store.register(EnvelopeKind::HandshakeRequest, Duration::from_secs(5));

        assert_eq!(
            store.complete(id, EnvelopeKind::Reply, Ok(Value::Null)),
            Completion::KindMismatch
        );
        assert!(store.is_pending(&id));
        assert_eq!(
            store.complete(id, EnvelopeKind::HandshakeReply, Ok(Value::Null)),
            Completion::Delivered
        );
    }

    #[tokio::test]
    async fn test_cancel_all_resumes_callers() {
        let store = PendingRequestStore::new();
        let (_id1, rx1) = store.register(EnvelopeKind::Request, Duration::from_secs(5));
        let (_id2, rx2) = store.register(EnvelopeKind::Request, Duration::from_secs(5));

        assert_eq!(store.cancel_all(), 2);
        assert!(matches!(rx1.await.unwrap(), Err(BridgeError::Cancelled)));
        assert!(matches!(rx2.await.unwrap(), Err(BridgeError::Cancelled)));
        assert_eq!(store.stats().total_cancelled.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_caller_gone() {
        let store = PendingRequestStore::new();
        let (id, rx) = store.register(EnvelopeKind::Request, Duration::from_secs(5));
        drop(rx);

        assert_eq!(
            store.complete(id, EnvelopeKind::Reply, Ok(Value::Null)),
            Completion::CallerGone
        );
    }

    #[tokio::test]
    async fn test_remove_expired() {
        let store = PendingRequestStore::new();
        let (id1, rx1) = store.register(EnvelopeKind::Request, Duration::from_millis(5));
        let (id2, _rx2) = store.register(EnvelopeKind::Request, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.remove_expired(), 1);
        assert!(!store.is_pending(&id1));
        assert!(store.is_pending(&id2));
        match rx1.await.unwrap() {
            Err(BridgeError::RequestTimeout { correlation_id, .. }) => {
                assert_eq!(correlation_id, id1)
            }
            other => panic!("swept request resolved as {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expire_counts_timeout() {
        let store = PendingRequestStore::new();
        let (id, _rx) = store.register(EnvelopeKind::Request, Duration::from_secs(5));

        assert!(store.expire(&id));
        assert!(!store.expire(&id));
        assert_eq!(store.stats().total_timeouts.load(Ordering::Relaxed), 1);
    }
}
