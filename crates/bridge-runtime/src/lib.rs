//! # Bridge Runtime
//!
//! Runs a host page and its guest pages in one process, connected by
//! in-memory frame channels, and reports what each side observed.
//!
//! ## Scenario Flow
//!
//! ```text
//! Host                                   Guest (alice)
//!  │ attach(alice) ── handshake ─────────→ │ store Context
//!  │                                       │ request { a: 0, b: 1 }
//!  │ { sum: 1, sender: "host" } ─────────→ │ myResponse
//!  │ hello { sender: "host", .. } ───────→ │ foo
//!  │ ←──────── hello { sender: "alice" } ──│ (unless no_hello)
//!  │ ←──────── ready ──────────────────────│ (unless no_hello / no_ready)
//!  │ status after the observation window   │
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod guest;
pub mod host;
pub mod runner;
pub mod scenario;

pub use config::{RuntimeConfig, RuntimeConfigError};
pub use guest::{GuestApp, GuestView};
pub use host::{sum_reply, HostApp, HOST_SENDER};
pub use runner::{run_scenario, RuntimeError, ScenarioReport, Session, SETTLE_MARGIN};
pub use scenario::{GuestBehavior, Scenario, UnknownScenario};
