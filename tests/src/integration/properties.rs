//! # Protocol Properties
//!
//! Correlation, isolation, cancellation and origin checks across real host
//! and guest bridges.

use super::fixtures::{bridge_config, context, frame, guest_bridge, HOST_ORIGIN, TOKEN};
use bridge_core::{
    handler_fn, Bridge, BridgeClient, BridgeError, BridgeState, ConnectionRegistry,
    ContextProvider, HostOptions,
};
use bridge_transport::{MessageChannel, Transport};
use bridge_types::{
    Context, CorrelationId, Credential, Envelope, EnvelopeKind, ErrorCause, EventMessage, FrameId,
};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(1);

fn sum_handler(sender: &'static str) -> Arc<dyn bridge_core::RequestHandler> {
    handler_fn(move |payload: Value| async move {
        let a = payload["a"].as_i64().unwrap_or(0);
        let b = payload["b"].as_i64().unwrap_or(0);
        Ok(json!({ "sum": a + b, "sender": sender }))
    })
}

struct PerFrame;

impl ContextProvider for PerFrame {
    fn context_for(&self, frame: &FrameId) -> Context {
        let base = context();
        Context::new(
            Credential::new(format!("token-{frame}"), base.auth.expires_at),
            json!({ "frame": frame }),
        )
    }
}

// =============================================================================
// HANDSHAKE AND REQUESTS
// =============================================================================

#[tokio::test]
async fn test_tokens_match_after_handshake() {
    let registry = ConnectionRegistry::new(context(), bridge_config());
    let (frame_ref, port) = frame("alice");
    let alice = guest_bridge("alice", port);
    alice.init().await.unwrap();

    let connection = registry.attach(frame_ref).unwrap();
    connection.bridge().wait_ready(WAIT).await.unwrap();
    alice.wait_ready(WAIT).await.unwrap();

    assert_eq!(alice.current_token().unwrap(), TOKEN);
    assert_eq!(connection.bridge().current_token().unwrap(), TOKEN);
    assert_eq!(
        alice.current_context().unwrap().auth,
        connection.bridge().current_context().unwrap().auth
    );
}

#[tokio::test]
async fn test_sum_request_and_not_ready_guard() {
    let (host_port, guest_port) =
        MessageChannel::pair(HOST_ORIGIN.into(), "https://alice.guest.localhost".into());
    let host_client = BridgeClient::new(
        "host/alice",
        Arc::new(host_port),
        "https://alice.guest.localhost".into(),
        bridge_config().client,
    )
    .unwrap();
    let host = Bridge::host(host_client, HostOptions::new(context()));
    let alice = guest_bridge("alice", guest_port);
    alice.set_request_handler(sum_handler("alice"));

    // Before the handshake: a state error, never stale data
    assert!(matches!(
        host.request(json!({ "a": 1, "b": 2 })).await,
        Err(BridgeError::NotReady {
            state: BridgeState::NotStarted
        })
    ));

    alice.init().await.unwrap();
    host.init().await.unwrap();

    let reply = host.request(json!({ "a": 1, "b": 2 })).await.unwrap();
    assert_eq!(reply, json!({ "sum": 3, "sender": "alice" }));
}

#[tokio::test]
async fn test_concurrent_requests_resolve_independently() {
    let registry = ConnectionRegistry::new(context(), bridge_config());
    let (frame_ref, port) = frame("alice");
    let alice = guest_bridge("alice", port);
    alice.set_request_handler(handler_fn(|payload: Value| async move {
        let delay = payload["delay"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(payload["n"].clone())
    }));
    alice.init().await.unwrap();

    let connection = registry.attach(frame_ref).unwrap();
    connection.bridge().wait_ready(WAIT).await.unwrap();

    let requests = (0..20u64).map(|n| {
        let bridge = connection.bridge().clone();
        async move {
            bridge
                .request(json!({ "n": n, "delay": (20 - n) * 5 }))
                .await
        }
    });
    let replies = join_all(requests).await;

    for (n, reply) in replies.into_iter().enumerate() {
        assert_eq!(reply.unwrap(), json!(n));
    }
    assert_eq!(connection.bridge().client().pending_count(), 0);
}

// =============================================================================
// ISOLATION AND CANCELLATION
// =============================================================================

#[tokio::test]
async fn test_two_connections_never_cross_contaminate() {
    let registry = ConnectionRegistry::new(PerFrame, bridge_config());
    let (alice_ref, alice_port) = frame("alice");
    let (bob_ref, bob_port) = frame("bob");
    let alice = guest_bridge("alice", alice_port);
    let bob = guest_bridge("bob", bob_port);
    alice.init().await.unwrap();
    bob.init().await.unwrap();

    let alice_conn = registry.attach(alice_ref).unwrap();
    let bob_conn = registry.attach(bob_ref).unwrap();
    alice_conn.bridge().wait_ready(WAIT).await.unwrap();
    bob_conn.bridge().wait_ready(WAIT).await.unwrap();

    let bob_before = bob_conn.status();
    alice.emit("hello", json!({ "sender": "alice" })).await.unwrap();
    alice.ready().await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(alice.current_token().unwrap(), "token-alice");
    assert_eq!(bob.current_token().unwrap(), "token-bob");
    assert!(alice_conn.is_operational());
    assert!(!bob_conn.is_operational());

    let bob_after = bob_conn.status();
    assert_eq!(bob_after.ready, bob_before.ready);
    assert_eq!(bob_after.payload, None);
    assert!(bob_after.error.unwrap().is(ErrorCause::NOT_STARTED));
}

#[tokio::test]
async fn test_detach_cancels_only_that_connection() {
    let registry = ConnectionRegistry::new(context(), bridge_config());
    let (alice_ref, alice_port) = frame("alice");
    let (bob_ref, bob_port) = frame("bob");
    let alice = guest_bridge("alice", alice_port);
    let bob = guest_bridge("bob", bob_port);
    let slow = handler_fn(|payload: Value| async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(payload)
    });
    alice.set_request_handler(Arc::clone(&slow));
    bob.set_request_handler(slow);
    alice.init().await.unwrap();
    bob.init().await.unwrap();

    let alice_conn = registry.attach(alice_ref).unwrap();
    let bob_conn = registry.attach(bob_ref).unwrap();
    alice_conn.bridge().wait_ready(WAIT).await.unwrap();
    bob_conn.bridge().wait_ready(WAIT).await.unwrap();

    let alice_pending = {
        let bridge = alice_conn.bridge().clone();
        tokio::spawn(async move { bridge.request(json!("alice")).await })
    };
    let bob_pending = {
        let bridge = bob_conn.bridge().clone();
        tokio::spawn(async move { bridge.request(json!("bob")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    registry.detach(&FrameId::new("alice")).unwrap();

    let cancelled = tokio::time::timeout(Duration::from_millis(100), alice_pending)
        .await
        .expect("cancellation is immediate")
        .unwrap();
    assert!(matches!(cancelled, Err(BridgeError::Cancelled)));
    assert_eq!(bob_pending.await.unwrap().unwrap(), json!("bob"));
    assert_eq!(registry.frame_ids(), vec![FrameId::new("bob")]);
}

// =============================================================================
// CORRELATION AND ORIGIN
// =============================================================================

#[tokio::test]
async fn test_late_reply_never_reaches_newer_request() {
    let (host_port, raw_guest) =
        MessageChannel::pair(HOST_ORIGIN.into(), "https://alice.guest.localhost".into());
    let client = BridgeClient::new(
        "host/alice",
        Arc::new(host_port),
        "https://alice.guest.localhost".into(),
        bridge_config().client,
    )
    .unwrap();
    client.start();
    let mut guest_inbound = raw_guest.take_inbound().unwrap();

    // First request times out; its reply arrives late
    let first = client
        .send_request_with_timeout(
            EnvelopeKind::Request,
            json!(1),
            Some(Duration::from_millis(30)),
        )
        .await;
    assert!(matches!(first, Err(BridgeError::RequestTimeout { .. })));
    let stale_id = Envelope::decode(&guest_inbound.recv().await.unwrap().data)
        .unwrap()
        .correlation_id
        .unwrap();

    let second = {
        let client = client.clone();
        tokio::spawn(async move { client.send_request(EnvelopeKind::Request, json!(2)).await })
    };
    let fresh_id = Envelope::decode(&guest_inbound.recv().await.unwrap().data)
        .unwrap()
        .correlation_id
        .unwrap();
    assert_ne!(stale_id, fresh_id);

    let late = Envelope::reply(EnvelopeKind::Reply, stale_id, Ok(json!("late")));
    raw_guest.post(late.encode().unwrap()).await.unwrap();
    let fresh = Envelope::reply(EnvelopeKind::Reply, fresh_id, Ok(json!("fresh")));
    raw_guest.post(fresh.encode().unwrap()).await.unwrap();

    assert_eq!(second.await.unwrap().unwrap(), json!("fresh"));
    assert_eq!(
        client
            .stats()
            .replies_discarded
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn test_mismatched_origin_is_rejected() {
    let registry = ConnectionRegistry::new(context(), bridge_config());
    // The host expects alice's origin but the frame actually runs elsewhere
    let (host_port, impostor) =
        MessageChannel::pair(HOST_ORIGIN.into(), "https://evil.example".into());
    let frame_ref = bridge_core::FrameRef::new(
        "alice",
        "https://alice.guest.localhost".into(),
        Arc::new(host_port),
    );
    let connection = registry.attach(frame_ref).unwrap();
    let mut impostor_inbound = impostor.take_inbound().unwrap();

    // Answer the handshake and pretend to be an eager guest
    let handshake = Envelope::decode(&impostor_inbound.recv().await.unwrap().data).unwrap();
    assert_eq!(handshake.kind, EnvelopeKind::HandshakeRequest);
    let reply = Envelope::reply(
        EnvelopeKind::HandshakeReply,
        handshake.correlation_id.unwrap(),
        Ok(json!({ "data": null })),
    );
    impostor.post(reply.encode().unwrap()).await.unwrap();
    let hello = Envelope::event(EventMessage::new("hello", json!("spoofed")));
    impostor.post(hello.encode().unwrap()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(connection.bridge().state(), BridgeState::Handshaking);
    assert_eq!(connection.status().payload, None);
    assert!(connection
        .bridge()
        .info()
        .last_violation
        .unwrap()
        .contains("origin mismatch"));
}

#[tokio::test]
async fn test_duplicate_reply_is_not_transmitted() {
    let (raw_host, guest_port) =
        MessageChannel::pair(HOST_ORIGIN.into(), "https://alice.guest.localhost".into());
    let alice = guest_bridge("alice", guest_port);
    alice.set_request_handler(sum_handler("alice"));
    alice.init().await.unwrap();
    let mut host_inbound = raw_host.take_inbound().unwrap();

    let id = CorrelationId::new();
    let request = Envelope::request(EnvelopeKind::Request, id, json!({ "a": 2, "b": 2 }));
    raw_host.post(request.encode().unwrap()).await.unwrap();

    let reply = Envelope::decode(&host_inbound.recv().await.unwrap().data).unwrap();
    assert_eq!(reply.correlation_id, Some(id));
    assert_eq!(reply.into_outcome().unwrap()["sum"], json!(4));

    let again = alice.client().send_reply(id, Ok(json!("again"))).await;
    assert!(matches!(again, Err(BridgeError::ProtocolViolation(_))));
    let nothing = tokio::time::timeout(Duration::from_millis(50), host_inbound.recv()).await;
    assert!(nothing.is_err());
}
