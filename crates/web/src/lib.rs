//! Handlers, middleware and multipart upload on top of `relay-http`
//!
//! - [`Handler`]: an async `Request<Body> -> Response<Body>` function, shared across requests
//! - [`middleware`]: composable wrappers around handlers, with timing, CORS and bearer
//!   token implementations
//! - [`upload`]: a handler storing the files of a `multipart/form-data` request in a
//!   directory, refusing oversized or malformed bodies before anything is written
//!
//! # Example
//!
//! ```no_run
//! use relay_web::middleware::{Cors, Middleware, MiddlewareChain, Timing};
//! use relay_web::upload::{UploadConfig, UploadHandler};
//! use relay_web::{Body, Handler};
//!
//! # async fn serve(request: http::Request<Body>) -> Result<(), relay_http::protocol::BoxError> {
//! let upload = UploadHandler::new(UploadConfig::builder("/var/uploads").build());
//! let handler = MiddlewareChain::new().and_then(Timing::new()).and_then(Cors::default()).wrap(upload);
//!
//! let response = handler.call(request).await?;
//! assert!(response.status().is_success());
//! # Ok(())
//! # }
//! ```

mod body;
mod handler;

pub mod middleware;
pub mod upload;

pub use body::Body;
pub use handler::BoxHandler;
pub use handler::FnHandler;
pub use handler::Handler;
pub use handler::HandlerResult;
pub use handler::handler_fn;
