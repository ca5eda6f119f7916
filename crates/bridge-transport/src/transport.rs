//! # Transport Contract
//!
//! The interface the bridge consumes from the underlying cross-boundary channel.

use crate::stream::InboundStream;
use async_trait::async_trait;
use bridge_types::Origin;
use thiserror::Error;

/// One inbound payload together with the origin of the context that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Origin reported by the platform for the sender.
    pub origin: Origin,
    /// Opaque payload text.
    pub data: String,
}

/// Errors from transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The counterpart context is gone.
    #[error("Transport closed")]
    Closed,

    /// The inbound side was already claimed by another listener.
    #[error("Inbound stream already taken")]
    InboundTaken,
}

/// Delivers opaque payloads to one target context and exposes inbound traffic.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Post a payload to the target context.
    async fn post(&self, data: String) -> Result<(), TransportError>;

    /// Take the inbound stream. Returns `None` once it has been taken.
    fn take_inbound(&self) -> Option<InboundStream>;
}
