//! # Session Context
//!
//! The payload negotiated by a handshake: an opaque, time-bounded credential
//! plus arbitrary host-supplied data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque auth credential issued outside the bridge.
///
/// The bridge never mints or verifies the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub token: String,
    /// ISO-8601 UTC expiry, e.g. `2022-01-06T20:48:14.919Z`.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// True once `now` has reached the expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Negotiated session payload, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub auth: Credential,
    #[serde(default)]
    pub data: Value,
}

impl Context {
    pub fn new(auth: Credential, data: Value) -> Self {
        Self { auth, data }
    }

    /// Token of the embedded credential.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.auth.token
    }

    /// New context with the same credential and different data.
    #[must_use]
    pub fn with_data(&self, data: Value) -> Self {
        Self {
            auth: self.auth.clone(),
            data,
        }
    }
}
