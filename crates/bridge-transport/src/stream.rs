//! # Inbound Stream
//!
//! Receiving side of a transport endpoint.

use crate::transport::Delivery;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

/// Ordered stream of deliveries for one endpoint.
///
/// Ends when every sender feeding it has been dropped.
pub struct InboundStream {
    inner: UnboundedReceiverStream<Delivery>,
}

impl InboundStream {
    /// Wrap the receiving half of a delivery channel.
    #[must_use]
    pub fn new(receiver: mpsc::UnboundedReceiver<Delivery>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(receiver),
        }
    }

    /// Receive the next delivery, or `None` when the channel closed.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.inner.as_mut().recv().await
    }
}

impl Stream for InboundStream {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
