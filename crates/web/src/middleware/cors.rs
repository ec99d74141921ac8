use crate::body::Body;
use crate::handler::{Handler, HandlerResult};
use crate::middleware::Middleware;
use async_trait::async_trait;
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use tracing::trace;

const DEFAULT_ALLOW_ORIGIN: &str = "*";
const DEFAULT_ALLOW_HEADERS: &str = "Content-Type,AccessToken,X-CSRF-Token, Authorization, Token";
const DEFAULT_ALLOW_CREDENTIALS: &str = "true";
const DEFAULT_ALLOW_METHODS: &str = "POST, GET, OPTIONS, PUT, DELETE";
const DEFAULT_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Adds cross-origin headers to every response and answers preflight requests.
///
/// `OPTIONS` requests get `204 No Content` without reaching the wrapped handler.
#[derive(Debug, Clone)]
pub struct Cors {
    allow_origin: HeaderValue,
    allow_headers: HeaderValue,
    allow_credentials: HeaderValue,
    allow_methods: HeaderValue,
    default_content_type: HeaderValue,
}

impl Cors {
    pub fn builder() -> CorsBuilder {
        CorsBuilder::new()
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, self.allow_credentials.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.entry(CONTENT_TYPE).or_insert_with(|| self.default_content_type.clone());
    }
}

impl Default for Cors {
    fn default() -> Self {
        CorsBuilder::new().build()
    }
}

#[derive(Debug, Clone)]
pub struct CorsBuilder {
    cors: Cors,
}

impl CorsBuilder {
    fn new() -> Self {
        Self {
            cors: Cors {
                allow_origin: HeaderValue::from_static(DEFAULT_ALLOW_ORIGIN),
                allow_headers: HeaderValue::from_static(DEFAULT_ALLOW_HEADERS),
                allow_credentials: HeaderValue::from_static(DEFAULT_ALLOW_CREDENTIALS),
                allow_methods: HeaderValue::from_static(DEFAULT_ALLOW_METHODS),
                default_content_type: HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
            },
        }
    }

    pub fn allow_origin(mut self, value: HeaderValue) -> Self {
        self.cors.allow_origin = value;
        self
    }

    pub fn allow_headers(mut self, value: HeaderValue) -> Self {
        self.cors.allow_headers = value;
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.cors.allow_credentials = HeaderValue::from_static(if allow { "true" } else { "false" });
        self
    }

    pub fn allow_methods(mut self, value: HeaderValue) -> Self {
        self.cors.allow_methods = value;
        self
    }

    /// Content type set on responses whose handler did not choose one.
    pub fn default_content_type(mut self, value: HeaderValue) -> Self {
        self.cors.default_content_type = value;
        self
    }

    pub fn build(self) -> Cors {
        self.cors
    }
}

impl<H: Handler> Middleware<H> for Cors {
    type Out = CorsHandler<H>;

    fn wrap(&self, handler: H) -> Self::Out {
        CorsHandler { handler, cors: self.clone() }
    }
}

#[derive(Debug)]
pub struct CorsHandler<H> {
    handler: H,
    cors: Cors,
}

#[async_trait]
impl<H: Handler> Handler for CorsHandler<H> {
    async fn call(&self, req: Request<Body>) -> HandlerResult {
        if req.method() == Method::OPTIONS {
            trace!(path = req.uri().path(), "answer preflight request");
            let mut response = Response::builder().status(StatusCode::NO_CONTENT).body(Body::empty())?;
            self.cors.apply(response.headers_mut());
            return Ok(response);
        }

        let mut response = self.handler.call(req).await?;
        self.cors.apply(response.headers_mut());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MockHandler;
    use mime::TEXT_PLAIN_UTF_8;

    #[tokio::test]
    async fn test_sets_default_headers() {
        let mut inner = MockHandler::new();
        inner.expect_call().times(1).returning(|_| Ok(Response::new(Body::from("{}"))));
        let handler = Cors::default().wrap(inner);

        let response = handler.call(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();

        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], DEFAULT_ALLOW_HEADERS);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], DEFAULT_ALLOW_METHODS);
        assert_eq!(headers[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_keeps_handler_content_type() {
        let mut inner = MockHandler::new();
        inner.expect_call().times(1).returning(|_| {
            Ok(Response::builder().header(CONTENT_TYPE, TEXT_PLAIN_UTF_8.as_ref()).body(Body::from("plain"))?)
        });
        let handler = Cors::default().wrap(inner);

        let response = handler.call(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();

        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_PLAIN_UTF_8.as_ref());
    }

    #[tokio::test]
    async fn test_preflight_does_not_delegate() {
        let mut inner = MockHandler::new();
        inner.expect_call().never();
        let handler = Cors::builder().allow_origin(HeaderValue::from_static("https://example.com")).build().wrap(inner);

        let response = handler.call(Request::options("/upload").body(Body::empty()).unwrap()).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://example.com");
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let mut inner = MockHandler::new();
        inner.expect_call().times(1).returning(|_| Err("boom".into()));
        let handler = Cors::default().wrap(inner);

        assert!(handler.call(Request::get("/").body(Body::empty()).unwrap()).await.is_err());
    }
}
