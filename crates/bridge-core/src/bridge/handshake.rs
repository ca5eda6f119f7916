//! Inbound request routing and the handshake reply payload.

use super::BridgeShared;
use crate::client::RequestHandler;
use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use bridge_types::{EnvelopeKind, ErrorCause};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Weak;

/// Payload of a `handshake-reply`: the guest's contributed data, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandshakeAck {
    #[serde(default)]
    pub data: Value,
}

impl HandshakeAck {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    pub fn into_payload(self) -> Value {
        serde_json::json!({ "data": self.data })
    }

    /// Parse a reply payload. A `null` payload is an empty ack.
    pub fn from_payload(payload: Value) -> BridgeResult<Self> {
        if payload.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(payload).map_err(|e| {
            BridgeError::ProtocolViolation(format!("malformed handshake reply: {e}"))
        })
    }
}

/// The client-level handler every bridge installs.
///
/// Handshake requests go to the bridge itself, everything else to the
/// application handler. Holds a weak reference so the client does not keep
/// its own bridge alive.
pub(super) struct BridgeRouter {
    pub(super) shared: Weak<BridgeShared>,
}

#[async_trait]
impl RequestHandler for BridgeRouter {
    async fn handle(&self, kind: EnvelopeKind, payload: Value) -> Result<Value, ErrorCause> {
        let Some(shared) = self.shared.upgrade() else {
            return Err(ErrorCause::with_message(
                ErrorCause::HANDLER_MISSING,
                "bridge dropped",
            ));
        };

        if kind == EnvelopeKind::HandshakeRequest {
            return shared.accept_handshake(payload);
        }

        let handler = shared.app_handler.read().clone();
        match handler {
            Some(handler) => handler.handle(kind, payload).await,
            None => Err(ErrorCause::new(ErrorCause::HANDLER_MISSING)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ack_payload_shape() {
        let ack = HandshakeAck::new(json!({ "theme": "dark" }));
        assert_eq!(ack.into_payload(), json!({ "data": { "theme": "dark" } }));
    }

    #[test]
    fn test_ack_parsing() {
        assert_eq!(HandshakeAck::from_payload(Value::Null).unwrap().data, Value::Null);
        assert_eq!(
            HandshakeAck::from_payload(json!({})).unwrap(),
            HandshakeAck::default()
        );
        assert!(matches!(
            HandshakeAck::from_payload(json!([1, 2])),
            Err(BridgeError::ProtocolViolation(_))
        ));
    }
}
