//! # Message Envelope
//!
//! The wire-level unit exchanged between a host and a guest frame.
//!
//! ```text
//! { "kind": "request", "correlationId": "0190...", "payload": {...} }
//! { "kind": "reply",   "correlationId": "0190...", "payload": null, "error": { "cause": "..." } }
//! { "kind": "event",   "payload": { "event": "ready", "data": null } }
//! ```
//!
//! ## Correlation Rules
//!
//! - Request and reply kinds MUST carry a `correlationId`.
//! - A reply echoes the id of exactly one prior request.
//! - Only reply kinds may carry an `error`.

use crate::correlation::CorrelationId;
use crate::errors::{EnvelopeError, ErrorCause};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Discriminator for the five envelope kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeKind {
    HandshakeRequest,
    HandshakeReply,
    Request,
    Reply,
    Event,
}

impl EnvelopeKind {
    /// Wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandshakeRequest => "handshake-request",
            Self::HandshakeReply => "handshake-reply",
            Self::Request => "request",
            Self::Reply => "reply",
            Self::Event => "event",
        }
    }

    /// True for `request` and `handshake-request`.
    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request | Self::HandshakeRequest)
    }

    /// True for `reply` and `handshake-reply`.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Reply | Self::HandshakeReply)
    }

    /// The reply kind answering this request kind.
    #[must_use]
    pub fn reply_kind(&self) -> Option<EnvelopeKind> {
        match self {
            Self::Request => Some(Self::Reply),
            Self::HandshakeRequest => Some(Self::HandshakeReply),
            _ => None,
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The universal wrapper for everything sent over a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Kind discriminator.
    pub kind: EnvelopeKind,

    /// Present on request/reply kinds, absent on events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,

    /// Opaque payload.
    #[serde(default)]
    pub payload: Value,

    /// Structured error, reply kinds only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCause>,
}

impl Envelope {
    /// Build a request (or handshake request) envelope.
    #[must_use]
    pub fn request(kind: EnvelopeKind, correlation_id: CorrelationId, payload: Value) -> Self {
        Self {
            kind,
            correlation_id: Some(correlation_id),
            payload,
            error: None,
        }
    }

    /// Build a reply (or handshake reply) envelope from a handler outcome.
    #[must_use]
    pub fn reply(
        kind: EnvelopeKind,
        correlation_id: CorrelationId,
        outcome: Result<Value, ErrorCause>,
    ) -> Self {
        let (payload, error) = match outcome {
            Ok(payload) => (payload, None),
            Err(cause) => (Value::Null, Some(cause)),
        };
        Self {
            kind,
            correlation_id: Some(correlation_id),
            payload,
            error,
        }
    }

    /// Build a one-way event envelope.
    #[must_use]
    pub fn event(message: EventMessage) -> Self {
        Self {
            kind: EnvelopeKind::Event,
            correlation_id: None,
            payload: message.into_payload(),
            error: None,
        }
    }

    /// Check the correlation rules for this envelope's kind.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if (self.kind.is_request() || self.kind.is_reply()) && self.correlation_id.is_none() {
            return Err(EnvelopeError::MissingCorrelationId { kind: self.kind });
        }
        if self.error.is_some() && !self.kind.is_reply() {
            return Err(EnvelopeError::UnexpectedError { kind: self.kind });
        }
        Ok(())
    }

    /// Serialize to wire text.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate wire text.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Split a reply into its outcome.
    pub fn into_outcome(self) -> Result<Value, ErrorCause> {
        match self.error {
            Some(cause) => Err(cause),
            None => Ok(self.payload),
        }
    }
}

/// Named application event carried in an event envelope's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Event name, e.g. `ready`.
    pub event: String,
    /// Event data.
    #[serde(default)]
    pub data: Value,
}

impl EventMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Encode as an envelope payload.
    #[must_use]
    pub fn into_payload(self) -> Value {
        serde_json::json!({ "event": self.event, "data": self.data })
    }

    /// Decode from an envelope payload.
    pub fn from_payload(payload: Value) -> Result<Self, EnvelopeError> {
        serde_json::from_value(payload).map_err(|e| EnvelopeError::MalformedEvent(e.to_string()))
    }
}
