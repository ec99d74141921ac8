use crate::body::Body;
use crate::handler::{Handler, HandlerResult};
use crate::middleware::Middleware;
use async_trait::async_trait;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::warn;

const BEARER: &str = "Bearer";

/// Rejects requests that do not carry `Authorization: Bearer <token>` with the expected token.
///
/// Rejected requests get `401 Unauthorized` with `WWW-Authenticate: Bearer` and never reach
/// the wrapped handler.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    token: Arc<str>,
}

impl BearerAuth {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self { token: token.into() }
    }

    fn is_authorized(&self, value: Option<&HeaderValue>) -> bool {
        let Some(value) = value.and_then(|value| value.to_str().ok()) else {
            return false;
        };

        match value.split_once(' ') {
            Some((scheme, token)) => scheme.eq_ignore_ascii_case(BEARER) && token.trim() == &*self.token,
            None => false,
        }
    }
}

impl<H: Handler> Middleware<H> for BearerAuth {
    type Out = BearerAuthHandler<H>;

    fn wrap(&self, handler: H) -> Self::Out {
        BearerAuthHandler { handler, auth: self.clone() }
    }
}

#[derive(Debug)]
pub struct BearerAuthHandler<H> {
    handler: H,
    auth: BearerAuth,
}

#[async_trait]
impl<H: Handler> Handler for BearerAuthHandler<H> {
    async fn call(&self, req: Request<Body>) -> HandlerResult {
        if self.auth.is_authorized(req.headers().get(AUTHORIZATION)) {
            return self.handler.call(req).await;
        }

        warn!(method = %req.method(), path = req.uri().path(), "reject unauthorized request");
        let response = Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header(WWW_AUTHENTICATE, BEARER)
            .body(Body::empty())?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MockHandler;

    fn request(authorization: Option<&'static str>) -> Request<Body> {
        let mut builder = Request::post("/upload");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_accepts_matching_token() {
        let mut inner = MockHandler::new();
        inner.expect_call().times(2).returning(|_| Ok(Response::new(Body::empty())));
        let handler = BearerAuth::new("s3cret").wrap(inner);

        let response = handler.call(request(Some("Bearer s3cret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = handler.call(request(Some("bearer s3cret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rejects_missing_or_wrong_token() {
        let mut inner = MockHandler::new();
        inner.expect_call().never();
        let handler = BearerAuth::new("s3cret").wrap(inner);

        for authorization in [None, Some("Bearer nope"), Some("Basic s3cret"), Some("s3cret")] {
            let response = handler.call(request(authorization)).await.unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{authorization:?}");
            assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
        }
    }
}
