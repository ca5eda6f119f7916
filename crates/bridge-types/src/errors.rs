//! # Error Types
//!
//! Structured error carried on the wire and the envelope decoding errors.

use crate::envelope::EnvelopeKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Structured error carried in a reply envelope or reported on a status surface.
///
/// Serializes as `{ "cause": "..." }`, with `message` only when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCause {
    /// Machine-readable cause.
    pub cause: String,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorCause {
    /// Guest never produced any application-level signal.
    pub const NOT_STARTED: &'static str = "not_started";
    /// Guest produced application traffic but never emitted `ready`.
    pub const NOT_READY: &'static str = "not_ready";
    /// The peer had no handler for the request.
    pub const HANDLER_MISSING: &'static str = "handler_missing";
    /// The peer's handler failed.
    pub const HANDLER_FAILED: &'static str = "handler_failed";
    /// Handshake payload could not be read as a context.
    pub const INVALID_CONTEXT: &'static str = "invalid_context";
    /// Handshake did not complete.
    pub const HANDSHAKE_FAILED: &'static str = "handshake_failed";

    /// Create a cause without detail.
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            message: None,
        }
    }

    /// Create a cause with a human-readable message.
    pub fn with_message(cause: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            message: Some(message.into()),
        }
    }

    pub fn not_started() -> Self {
        Self::new(Self::NOT_STARTED)
    }

    pub fn not_ready() -> Self {
        Self::new(Self::NOT_READY)
    }

    /// True if this cause has the given name.
    pub fn is(&self, cause: &str) -> bool {
        self.cause == cause
    }
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.cause, message),
            None => write!(f, "{}", self.cause),
        }
    }
}

impl std::error::Error for ErrorCause {}

/// Errors raised while decoding or validating an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Text was not a well-formed envelope.
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A request/reply kind arrived without a correlation id.
    #[error("Envelope of kind {kind} is missing its correlation id")]
    MissingCorrelationId { kind: EnvelopeKind },

    /// Only reply kinds may carry an error.
    #[error("Envelope of kind {kind} must not carry an error")]
    UnexpectedError { kind: EnvelopeKind },

    /// Event payload is not `{ event, data }`.
    #[error("Event payload is malformed: {0}")]
    MalformedEvent(String),
}
