//! Bridge state and the `info()` snapshot.

use bridge_types::ErrorCause;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which end of the connection a bridge drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Guest => f.write_str("guest"),
        }
    }
}

/// Handshake state.
///
/// ```text
/// [NOT_STARTED] ──init()──→ [HANDSHAKING] ──handshake reply──→ [READY]
///                                │  ↑                            │
///                                └──┘ failure: stays,            └── re-handshake
///                                     init() may be retried          replaces Context
/// ```
///
/// Errors are recorded beside the state (`BridgeInfo::last_error`), never as a
/// state of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeState {
    #[default]
    NotStarted,
    Handshaking,
    Ready,
}

impl BridgeState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("NOT_STARTED"),
            Self::Handshaking => f.write_str("HANDSHAKING"),
            Self::Ready => f.write_str("READY"),
        }
    }
}

/// Point-in-time view of a bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeInfo {
    pub role: Role,
    pub state: BridgeState,
    pub has_context: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<ErrorCause>,
    pub last_violation: Option<String>,
    pub pending_requests: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(BridgeState::NotStarted.to_string(), "NOT_STARTED");
        assert_eq!(
            serde_json::to_string(&BridgeState::Handshaking).unwrap(),
            "\"HANDSHAKING\""
        );
        assert!(BridgeState::Ready.is_ready());
        assert_eq!(BridgeState::default(), BridgeState::NotStarted);
    }
}
