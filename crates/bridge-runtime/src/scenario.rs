//! Scenario selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which guests load and how they behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// One guest, full flow: handshake, request, hello, ready
    #[default]
    None,
    /// Guest never sends hello nor ready
    NoHello,
    /// Guest sends hello but never ready
    NoReady,
    /// Guests `alice` and `bob`, both with the full flow
    TwoGuests,
}

/// What a guest does after its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestBehavior {
    pub send_hello: bool,
    pub send_ready: bool,
}

impl GuestBehavior {
    pub const FULL: Self = Self {
        send_hello: true,
        send_ready: true,
    };
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::NoHello => "no_hello",
            Self::NoReady => "no_ready",
            Self::TwoGuests => "two_guests",
        }
    }

    pub fn guest_names(&self) -> &'static [&'static str] {
        match self {
            Self::TwoGuests => &["alice", "bob"],
            _ => &["alice"],
        }
    }

    pub fn guest_behavior(&self) -> GuestBehavior {
        match self {
            Self::NoHello => GuestBehavior {
                send_hello: false,
                send_ready: false,
            },
            Self::NoReady => GuestBehavior {
                send_hello: true,
                send_ready: false,
            },
            Self::None | Self::TwoGuests => GuestBehavior::FULL,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown scenario '{0}' (expected none, no_hello, no_ready or two_guests)")]
pub struct UnknownScenario(pub String);

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "none" => Ok(Self::None),
            "no_hello" => Ok(Self::NoHello),
            "no_ready" => Ok(Self::NoReady),
            "two_guests" => Ok(Self::TwoGuests),
            other => Err(UnknownScenario(other.to_string())),
        }
    }
}
