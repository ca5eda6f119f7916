//! # Bridge Core
//!
//! Host/guest frame messaging: request/reply correlation, the handshake state
//! machine and the host's multi-guest connection registry.
//!
//! ## Layers
//!
//! | Layer | Type | Owns |
//! |-------|------|------|
//! | Client | [`BridgeClient`] | pending request table, inbound ledger, event listeners |
//! | Session | [`Bridge`] | handshake state, negotiated [`Context`](bridge_types::Context), context observers |
//! | Host | [`ConnectionRegistry`] | one [`Connection`] per guest frame, status tracking |
//!
//! ## Guarantees
//!
//! - A reply resolves exactly one outstanding request; late or duplicate
//!   replies are discarded.
//! - Every inbound delivery is checked against the peer origin of its client.
//! - No handler or listener failure escapes into the dispatch loop.
//! - Connections share nothing, so detaching one never affects another.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod registry;

pub use bridge::{Bridge, BridgeInfo, BridgeState, GuestOptions, HandshakeAck, HostOptions, Role};
pub use client::{handler_fn, BridgeClient, ListenerResult, RequestHandler, Subscription};
pub use config::{BridgeConfig, ClientConfig, ConfigError, StatusConfig};
pub use error::{BridgeError, BridgeResult, RegistryError};
pub use registry::{
    Connection, ConnectionRegistry, ConnectionStatus, ContextProvider, FrameRef, StatusTracker,
};
