//! # Connection Registry
//!
//! Host-side map of guest frame → [`Connection`].
//!
//! Every connection owns its client, pending request table and listener
//! registries; nothing is shared between entries, so a slow or failed guest
//! never touches another guest's session.

mod connection;
mod status;

pub use connection::Connection;
pub use status::{ConnectionStatus, StatusTracker};

use crate::client::RequestHandler;
use crate::config::BridgeConfig;
use crate::error::RegistryError;
use bridge_transport::Transport;
use bridge_types::{Context, FrameId, Origin};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// A guest frame as discovered by the host.
#[derive(Clone)]
pub struct FrameRef {
    pub id: FrameId,
    /// Origin the guest's traffic must come from
    pub origin: Origin,
    /// Host endpoint of the frame's channel
    pub transport: Arc<dyn Transport>,
}

impl FrameRef {
    pub fn new(id: impl Into<FrameId>, origin: Origin, transport: Arc<dyn Transport>) -> Self {
        Self {
            id: id.into(),
            origin,
            transport,
        }
    }
}

/// Supplies the Context pushed to each attached frame.
pub trait ContextProvider: Send + Sync {
    fn context_for(&self, frame: &FrameId) -> Context;
}

/// Every frame receives the same Context.
impl ContextProvider for Context {
    fn context_for(&self, _frame: &FrameId) -> Context {
        self.clone()
    }
}

pub struct ConnectionRegistry {
    connections: DashMap<FrameId, Arc<Connection>>,
    provider: Arc<dyn ContextProvider>,
    config: BridgeConfig,
    handler: RwLock<Option<Arc<dyn RequestHandler>>>,
}

impl ConnectionRegistry {
    pub fn new(provider: impl ContextProvider + 'static, config: BridgeConfig) -> Self {
        Self {
            connections: DashMap::new(),
            provider: Arc::new(provider),
            config,
            handler: RwLock::new(None),
        }
    }

    /// Handler answering guest requests, installed on every current and
    /// future connection.
    pub fn set_request_handler(&self, handler: Arc<dyn RequestHandler>) {
        for connection in self.connections.iter() {
            connection.bridge().set_request_handler(Arc::clone(&handler));
        }
        *self.handler.write() = Some(handler);
    }

    /// Create a connection for `frame` and start its handshake in the background.
    ///
    /// Spawns the handshake and observation-window tasks, so it must run
    /// inside a tokio runtime.
    pub fn attach(&self, frame: FrameRef) -> Result<Arc<Connection>, RegistryError> {
        match self.connections.entry(frame.id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyAttached(frame.id)),
            Entry::Vacant(slot) => {
                let frame_id = frame.id.clone();
                let origin = frame.origin.clone();
                let context = self.provider.context_for(&frame_id);
                let handler = self.handler.read().clone();

                let connection = Connection::open(frame, context, &self.config, handler)?;
                slot.insert(Arc::clone(&connection));

                info!(frame = %frame_id, origin = %origin, "Attached guest frame");
                Ok(connection)
            }
        }
    }

    pub fn get(&self, frame_id: &FrameId) -> Option<Arc<Connection>> {
        self.connections
            .get(frame_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a connection, cancelling its outstanding requests.
    pub fn detach(&self, frame_id: &FrameId) -> Result<Arc<Connection>, RegistryError> {
        let (_, connection) = self
            .connections
            .remove(frame_id)
            .ok_or_else(|| RegistryError::NotAttached(frame_id.clone()))?;

        connection.close();
        info!(
            frame = %frame_id,
            attached_for_ms = (chrono::Utc::now() - connection.attached_at()).num_milliseconds(),
            "Detached guest frame"
        );
        Ok(connection)
    }

    /// Detach everything. Returns the number of connections closed.
    pub fn detach_all(&self) -> usize {
        let ids = self.frame_ids();
        ids.iter()
            .filter(|frame_id| self.detach(frame_id).is_ok())
            .count()
    }

    /// Status of every connection, ordered by frame id.
    pub fn statuses(&self) -> BTreeMap<FrameId, ConnectionStatus> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status()))
            .collect()
    }

    /// Attached frame ids, sorted.
    pub fn frame_ids(&self) -> Vec<FrameId> {
        let mut ids: Vec<FrameId> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}
