//! # In-Memory Message Channel
//!
//! A connected pair of ports, one per execution context, standing in for the
//! browser's cross-frame postMessage primitive.

use crate::stream::InboundStream;
use crate::transport::{Delivery, Transport, TransportError};
use async_trait::async_trait;
use bridge_types::Origin;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Factory for connected [`FramePort`] pairs.
pub struct MessageChannel;

impl MessageChannel {
    /// Create two connected ports.
    ///
    /// Payloads posted on the first port arrive on the second stamped with
    /// `first_origin`, and vice versa.
    #[must_use]
    pub fn pair(first_origin: Origin, second_origin: Origin) -> (FramePort, FramePort) {
        let (to_first, first_rx) = mpsc::unbounded_channel();
        let (to_second, second_rx) = mpsc::unbounded_channel();

        let first = FramePort::new(first_origin, to_second, first_rx);
        let second = FramePort::new(second_origin, to_first, second_rx);
        (first, second)
    }
}

/// One end of a [`MessageChannel`].
pub struct FramePort {
    /// Origin stamped on every payload this port posts.
    origin: Origin,

    /// Sender feeding the counterpart's inbound stream.
    peer: mpsc::UnboundedSender<Delivery>,

    /// Inbound receiver, until claimed.
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>,
}

impl FramePort {
    fn new(
        origin: Origin,
        peer: mpsc::UnboundedSender<Delivery>,
        inbound: mpsc::UnboundedReceiver<Delivery>,
    ) -> Self {
        Self {
            origin,
            peer,
            inbound: Mutex::new(Some(inbound)),
        }
    }
}

#[async_trait]
impl Transport for FramePort {
    async fn post(&self, data: String) -> Result<(), TransportError> {
        let delivery = Delivery {
            origin: self.origin.clone(),
            data,
        };

        match self.peer.send(delivery) {
            Ok(()) => {
                debug!(origin = %self.origin, "Payload posted");
                Ok(())
            }
            Err(_) => {
                warn!(origin = %self.origin, "Payload dropped (counterpart closed)");
                Err(TransportError::Closed)
            }
        }
    }

    fn take_inbound(&self) -> Option<InboundStream> {
        self.inbound.lock().take().map(InboundStream::new)
    }
}
