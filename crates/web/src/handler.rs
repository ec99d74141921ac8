use crate::body::Body;
use async_trait::async_trait;
use http::{Request, Response};
use relay_http::protocol::BoxError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type HandlerResult = Result<Response<Body>, BoxError>;

/// An asynchronous request handler.
///
/// Handlers are shared between concurrent requests, so they only get `&self`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, req: Request<Body>) -> HandlerResult;
}

pub type BoxHandler = Box<dyn Handler>;

#[async_trait]
impl<H: Handler + ?Sized> Handler for Box<H> {
    async fn call(&self, req: Request<Body>) -> HandlerResult {
        (**self).call(req).await
    }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn call(&self, req: Request<Body>) -> HandlerResult {
        (**self).call(req).await
    }
}

/// A [`Handler`] backed by an async function or closure.
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, req: Request<Body>) -> HandlerResult {
        (self.f)(req).await
    }
}
