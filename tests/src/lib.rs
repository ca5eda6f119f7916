//! # Frame Bridge Test Suite
//!
//! Cross-crate tests driving real host and guest bridges over in-memory frame
//! channels.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs    # Shared credential, configs and frame wiring
//!     ├── scenarios.rs   # none / no_hello / no_ready / two_guests end to end
//!     └── properties.rs  # Correlation, isolation, cancellation, origin checks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bridge-tests
//! cargo test -p bridge-tests integration::scenarios::
//! ```

#![allow(dead_code)]

pub mod integration;
