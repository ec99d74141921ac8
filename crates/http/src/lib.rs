//! Streamed HTTP bodies with bounded memory
//!
//! This crate provides the building blocks for moving HTTP bodies of any size through a
//! process without ever holding a whole body in memory:
//!
//! - [`transfer`]: copying an `AsyncRead` into an `AsyncWrite` through one fixed buffer,
//!   draining a body into a sink, and reading a body line by line
//! - [`pipe`]: an in-memory, unbuffered pipe; every write blocks until a reader takes it
//! - [`producer`]: outbound requests whose body is written by a background task while the
//!   request is being sent
//! - [`codec`]: a streaming `multipart/form-data` decoder
//! - [`protocol`]: the message and error types shared by the modules above
//!
//! # Example
//!
//! ```no_run
//! use relay_http::producer::StreamingRequestProducer;
//! use relay_http::transfer::{drain_body, COPY_BUFFER_SIZE};
//! use tracing::info;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let (request, handle) = StreamingRequestProducer::post("http://localhost:3333/upload")
//!         .spawn_iter(["line1\n", "line2\n", "line3\n"])?;
//!
//!     // a transport would send the request here; we drain the body locally
//!     let mut sink = tokio::io::sink();
//!     let copied = drain_body(request.into_body(), &mut sink, COPY_BUFFER_SIZE).await?;
//!
//!     let produced = handle.join().await?;
//!     info!(copied, produced, "request body streamed");
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! - [`protocol::TransferError`]: copy, pipe and line reading failures
//! - [`protocol::MultipartError`]: malformed or oversized multipart bodies
//! - [`protocol::ProducerError`]: failures building or feeding a streamed request

pub mod codec;
pub mod pipe;
pub mod producer;
pub mod protocol;
pub mod transfer;

mod utils;
pub(crate) use utils::ensure;
