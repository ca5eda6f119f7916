//! Request handler seam.

use async_trait::async_trait;
use bridge_types::{EnvelopeKind, ErrorCause};
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Answers inbound requests. The returned value (or error) becomes the reply.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, kind: EnvelopeKind, payload: Value) -> Result<Value, ErrorCause>;
}

/// Adapter turning an async closure into a [`RequestHandler`].
pub struct FnHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ErrorCause>> + Send,
{
    async fn handle(&self, _kind: EnvelopeKind, payload: Value) -> Result<Value, ErrorCause> {
        (self.f)(payload).await
    }
}

/// Build a handler from an async closure over the request payload.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ErrorCause>> + Send + 'static,
{
    Arc::new(FnHandler {
        f,
        _marker: PhantomData,
    })
}
