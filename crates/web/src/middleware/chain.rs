use crate::handler::{BoxHandler, Handler};
use crate::middleware::Middleware;
use std::fmt;

/// A type-erased middleware, as stored by [`MiddlewareChain`].
pub type BoxMiddleware = Box<dyn ErasedMiddleware>;

pub trait ErasedMiddleware: Send + Sync {
    fn wrap_boxed(&self, handler: BoxHandler) -> BoxHandler;
}

impl<M> ErasedMiddleware for M
where
    M: Middleware<BoxHandler> + Send + Sync,
    M::Out: 'static,
{
    fn wrap_boxed(&self, handler: BoxHandler) -> BoxHandler {
        Box::new(self.wrap(handler))
    }
}

/// An ordered sequence of middlewares, outermost first.
///
/// An empty chain wraps a handler without changing its behavior. A chain is itself a
/// middleware, so chains can be nested: `compose([compose([a, b]), c])`,
/// `compose([a, compose([b, c])])` and `compose([a, b, c])` all wrap a handler the same way.
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<BoxMiddleware>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compose<I, M>(middlewares: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Middleware<BoxHandler> + Send + Sync + 'static,
        M::Out: 'static,
    {
        middlewares.into_iter().fold(Self::new(), Self::and_then)
    }

    /// Appends `middleware` as the innermost wrapper registered so far.
    pub fn and_then<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<BoxHandler> + Send + Sync + 'static,
        M::Out: 'static,
    {
        self.middlewares.push(Box::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain").field("len", &self.middlewares.len()).finish()
    }
}

impl FromIterator<BoxMiddleware> for MiddlewareChain {
    fn from_iter<T: IntoIterator<Item = BoxMiddleware>>(iter: T) -> Self {
        Self { middlewares: iter.into_iter().collect() }
    }
}

impl<H: Handler + 'static> Middleware<H> for MiddlewareChain {
    type Out = BoxHandler;

    fn wrap(&self, handler: H) -> Self::Out {
        let handler: BoxHandler = Box::new(handler);
        self.middlewares.iter().rev().fold(handler, |handler, middleware| middleware.wrap_boxed(handler))
    }
}
