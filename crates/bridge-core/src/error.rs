//! Bridge error types.

use crate::bridge::BridgeState;
use bridge_transport::TransportError;
use bridge_types::{CorrelationId, EnvelopeError, ErrorCause, FrameId};
use std::time::Duration;
use thiserror::Error;

/// Result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors surfaced by clients and bridges.
///
/// All of them are local to the failing call; none corrupts client or bridge
/// state.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// No reply arrived before the deadline.
    #[error("Request {correlation_id} timed out after {}ms", timeout.as_millis())]
    RequestTimeout {
        correlation_id: CorrelationId,
        timeout: Duration,
    },

    /// The connection was torn down while the request was outstanding.
    #[error("Request cancelled: connection torn down")]
    Cancelled,

    /// Malformed envelope, duplicate reply, origin mismatch and similar.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Operation requires a completed handshake.
    #[error("Bridge not ready (state: {state})")]
    NotReady { state: BridgeState },

    /// The peer answered with an error.
    #[error("Remote error: {0}")]
    Remote(ErrorCause),

    /// The client was closed.
    #[error("Client closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<EnvelopeError> for BridgeError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Malformed(e) => Self::Serialization(e.to_string()),
            other => Self::ProtocolViolation(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors from the connection registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Frame {0} is already attached")]
    AlreadyAttached(FrameId),

    #[error("Frame {0} is not attached")]
    NotAttached(FrameId),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
