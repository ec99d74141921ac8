//! Composable handler wrappers.
//!
//! A [`Middleware`] turns a handler into another handler. Middlewares compose in two ways:
//!
//! - statically, with [`MiddlewareExt::and_then`], producing a typed [`Stack`]
//! - dynamically, with [`MiddlewareChain`], an ordered and type-erased sequence
//!
//! In both cases registration order is wrapping order, outermost first:
//! `MiddlewareChain::compose([a, b, c]).wrap(h)` behaves like `a.wrap(b.wrap(c.wrap(h)))`,
//! so `a` sees the request first and the response last.
//!
//! ```
//! use relay_web::middleware::{Cors, Middleware, MiddlewareChain, Timing};
//! use relay_web::{handler_fn, Body, Handler};
//! use http::{Request, Response};
//!
//! let hello = handler_fn(|_req: Request<Body>| async { Ok(Response::new(Body::from("hello"))) });
//!
//! let chain = MiddlewareChain::new().and_then(Timing::new()).and_then(Cors::default());
//! let handler = chain.wrap(hello);
//! # fn assert_handler<H: Handler>(_: &H) {}
//! # assert_handler(&handler);
//! ```

mod auth;
mod chain;
mod cors;
mod timing;

pub use auth::BearerAuth;
pub use auth::BearerAuthHandler;
pub use chain::BoxMiddleware;
pub use chain::ErasedMiddleware;
pub use chain::MiddlewareChain;
pub use cors::Cors;
pub use cors::CorsBuilder;
pub use cors::CorsHandler;
pub use timing::CallOutcome;
pub use timing::ElapsedRecorder;
pub use timing::Timing;
pub use timing::TimingHandler;
pub use timing::TracingRecorder;

use crate::handler::{BoxHandler, Handler};

/// Wraps a handler of type `H` into a new handler.
pub trait Middleware<H> {
    type Out: Handler;

    fn wrap(&self, handler: H) -> Self::Out;
}

pub trait MiddlewareExt: Middleware<BoxHandler> + Sized {
    /// Stacks `inner` beneath `self`: `self` becomes the outer wrapper.
    fn and_then<M>(self, inner: M) -> Stack<Self, M> {
        Stack { outer: self, inner }
    }

    /// Erases the type of this middleware so it can live in a [`MiddlewareChain`].
    fn boxed(self) -> BoxMiddleware
    where
        Self: Send + Sync + 'static,
        Self::Out: 'static,
    {
        Box::new(self)
    }
}

impl<M: Middleware<BoxHandler>> MiddlewareExt for M {}

#[derive(Default, Clone, Copy, Debug)]
pub struct IdentityMiddleware;

impl<H: Handler> Middleware<H> for IdentityMiddleware {
    type Out = H;

    #[inline(always)]
    fn wrap(&self, handler: H) -> Self::Out {
        handler
    }
}

/// Two middlewares applied one inside the other.
#[derive(Default, Clone, Copy, Debug)]
pub struct Stack<Outer, Inner> {
    outer: Outer,
    inner: Inner,
}

impl<Outer, Inner> Stack<Outer, Inner> {
    pub fn new(outer: Outer, inner: Inner) -> Self {
        Self { outer, inner }
    }
}

impl<H, Outer, Inner> Middleware<H> for Stack<Outer, Inner>
where
    Inner: Middleware<H>,
    Outer: Middleware<Inner::Out>,
{
    type Out = Outer::Out;

    fn wrap(&self, handler: H) -> Self::Out {
        self.outer.wrap(self.inner.wrap(handler))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Middleware;
    use crate::body::Body;
    use crate::handler::{Handler, HandlerResult};
    use async_trait::async_trait;
    use http::header::HeaderName;
    use http::{HeaderValue, Request, Response};

    pub(crate) const TRACE: HeaderName = HeaderName::from_static("x-trace");

    /// Appends its tag to the `x-trace` response header after the inner handler ran.
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct Tag(pub(crate) &'static str);

    #[derive(Debug)]
    pub(crate) struct Tagged<H> {
        tag: &'static str,
        handler: H,
    }

    impl<H: Handler> Middleware<H> for Tag {
        type Out = Tagged<H>;

        fn wrap(&self, handler: H) -> Self::Out {
            Tagged { tag: self.0, handler }
        }
    }

    #[async_trait]
    impl<H: Handler> Handler for Tagged<H> {
        async fn call(&self, req: Request<Body>) -> HandlerResult {
            let mut response = self.handler.call(req).await?;
            response.headers_mut().append(TRACE, HeaderValue::from_static(self.tag));
            Ok(response)
        }
    }

    pub(crate) fn ok_handler() -> impl Handler {
        crate::handler_fn(|_req: Request<Body>| async { Ok(Response::new(Body::from("ok"))) })
    }

    pub(crate) fn trace_of(response: &Response<Body>) -> Vec<&str> {
        response.headers().get_all(TRACE).iter().filter_map(|value| value.to_str().ok()).collect()
    }
}
