//! # Bridge Types Crate
//!
//! Wire-level and session-level types shared by every layer of the frame bridge.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: everything that crosses the frame boundary is
//!   defined here, so the transport, the client and the runtime agree on shape.
//! - **Opaque Payloads**: the bridge never interprets application payloads; they
//!   travel as `serde_json::Value`.
//! - **Whole-Value Context**: a `Context` is built once per handshake and
//!   replaced wholesale, never patched.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod context;
pub mod correlation;
pub mod envelope;
pub mod errors;
pub mod frame;

pub use context::{Context, Credential};
pub use correlation::CorrelationId;
pub use envelope::{Envelope, EnvelopeKind, EventMessage};
pub use errors::{EnvelopeError, ErrorCause};
pub use frame::{FrameId, Origin};

/// Event name reserved for the guest readiness signal.
pub const READY_EVENT: &str = "ready";
