//! Frame identity and origin.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a guest frame as seen by the host, e.g. `alice`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(String);

impl FrameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Origin of an execution context (scheme + host + port).
///
/// Comparison ignores ASCII case and a single trailing slash.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn normalized(&self) -> &str {
        self.0.strip_suffix('/').unwrap_or(&self.0)
    }
}

impl PartialEq for Origin {
    fn eq(&self, other: &Self) -> bool {
        self.normalized().eq_ignore_ascii_case(other.normalized())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Origin {
    fn from(origin: &str) -> Self {
        Self::new(origin)
    }
}
