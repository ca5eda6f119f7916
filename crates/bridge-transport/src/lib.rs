//! # Bridge Transport - Cross-Frame Delivery
//!
//! The transport is the raw, postMessage-style primitive underneath the bridge.
//! It delivers opaque text to the counterpart context and hands the receiving
//! side every inbound payload together with the sender's origin.
//!
//! ```text
//! ┌──────────────┐        post()          ┌──────────────┐
//! │  Host frame  │ ─────────────────────→ │ Guest frame  │
//! │  FramePort   │ ←───────────────────── │  FramePort   │
//! └──────────────┘   Delivery{origin,..}  └──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Delivery order per sender/receiver pair is preserved.
//! - No retry, no acknowledgment.
//! - Each port's inbound stream can be taken exactly once, so two clients can
//!   never share one endpoint.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod channel;
pub mod stream;
pub mod transport;

pub use channel::{FramePort, MessageChannel};
pub use stream::InboundStream;
pub use transport::{Delivery, Transport, TransportError};
