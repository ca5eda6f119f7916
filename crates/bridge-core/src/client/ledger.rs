//! # Inbound Request Ledger
//!
//! Tracks inbound request ids that still owe a reply.
//!
//! - An id is recorded when its request arrives; a second request reusing an
//!   id still in the ledger is rejected.
//! - `take` removes the id when its reply is sent, so a reply can go out at
//!   most once, and never for an id that was not received.

use bridge_types::{CorrelationId, EnvelopeKind};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from ledger operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The id is already awaiting a reply.
    #[error("Inbound request {id} is already awaiting a reply")]
    DuplicateRequest { id: CorrelationId },

    /// No inbound request with this id awaits a reply.
    #[error("No inbound request {id} awaits a reply")]
    NoSuchRequest { id: CorrelationId },
}

/// Map of inbound id -> request kind.
#[derive(Debug, Default)]
pub struct InboundLedger {
    awaiting: HashMap<CorrelationId, EnvelopeKind>,
}

impl InboundLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound request.
    pub fn record(&mut self, id: CorrelationId, kind: EnvelopeKind) -> Result<(), LedgerError> {
        if self.awaiting.contains_key(&id) {
            return Err(LedgerError::DuplicateRequest { id });
        }
        self.awaiting.insert(id, kind);
        Ok(())
    }

    /// Claim the right to reply; returns the reply kind to use.
    pub fn take(&mut self, id: CorrelationId) -> Result<EnvelopeKind, LedgerError> {
        self.awaiting
            .remove(&id)
            .and_then(|kind| kind.reply_kind())
            .ok_or(LedgerError::NoSuchRequest { id })
    }

    /// Number of inbound requests still owed a reply.
    #[must_use]
    pub fn len(&self) -> usize {
        self.awaiting.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.awaiting.is_empty()
    }

    pub fn clear(&mut self) {
        self.awaiting.clear();
    }
}
