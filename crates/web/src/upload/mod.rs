//! Size capped `multipart/form-data` upload into a directory.
//!
//! An upload goes through two phases:
//!
//! 1. the whole body is decoded under the `max_total_bytes` ceiling and every file part of
//!    the configured field is spooled, so malformed or oversized bodies are refused before
//!    any file is created
//! 2. each spooled part, in arrival order, is checked for a safe filename and copied into
//!    `upload_root`
//!
//! The first failure in phase 2 stops the upload. Files saved before it stay on disk.

mod config;
mod error;
mod path;
mod spool;

pub use config::UploadConfig;
pub use config::UploadConfigBuilder;
pub use error::UploadError;
pub use path::destination_path;

use crate::body::Body;
use crate::handler::{Handler, HandlerResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body::Body as HttpBody;
use http_body_util::Limited;
use relay_http::codec::MultipartDecoder;
use relay_http::protocol::{BoxError, Message, MultipartError, PayloadItem};
use relay_http::transfer::body_reader;
use serde::{Deserialize, Serialize};
use spool::SpooledPart;
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

/// Response body of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub files: Vec<SavedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFile {
    /// Name of the file inside the upload root.
    pub name: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Stores the file parts of a multipart `POST` under the configured upload root.
pub async fn handle_upload<B>(request: Request<B>, config: &UploadConfig) -> Result<UploadSummary, UploadError>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    if request.method() != Method::POST {
        return Err(UploadError::MethodNotAllowed { method: request.method().clone() });
    }

    let max_total_bytes = config.max_total_bytes();
    let decoder = request
        .headers()
        .get(CONTENT_TYPE)
        .ok_or_else(|| MultipartError::invalid_content_type("missing content type"))
        .and_then(MultipartDecoder::from_content_type)
        .map_err(|e| UploadError::from_multipart(e, max_total_bytes))?;

    let body = Limited::new(request.into_body(), max_total_bytes);
    let parts = spool_parts(body, decoder, config).await.inspect_err(|e| warn!(cause = %e, "refuse upload body"))?;

    store_parts(parts, config).await
}

async fn spool_parts<B>(body: B, decoder: MultipartDecoder, config: &UploadConfig) -> Result<Vec<SpooledPart>, UploadError>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let mut messages = FramedRead::with_capacity(body_reader(body), decoder, config.buffer_size());
    let mut memory_budget = config.max_memory();
    let mut parts = Vec::new();
    let mut current: Option<SpooledPart> = None;

    while let Some(message) = messages.next().await {
        let message = message.map_err(|e| UploadError::from_multipart(e, config.max_total_bytes()))?;
        match message {
            Message::Header(header) => {
                // an empty filename is what browsers send for an unused file input
                let wanted = header.name() == config.field_name() && header.filename().is_some_and(|name| !name.is_empty());
                if !wanted {
                    debug!(field = header.name(), "skip part");
                }
                current = wanted.then(|| SpooledPart::new(header));
            }
            Message::Payload(PayloadItem::Chunk(bytes)) => {
                if let Some(part) = current.as_mut() {
                    part.append(bytes, &mut memory_budget).await?;
                }
            }
            Message::Payload(PayloadItem::Eof) => {
                if let Some(part) = current.take() {
                    parts.push(part.finish().await?);
                }
            }
        }
    }

    Ok(parts)
}

async fn store_parts(parts: Vec<SpooledPart>, config: &UploadConfig) -> Result<UploadSummary, UploadError> {
    let mut files = Vec::with_capacity(parts.len());

    for part in parts {
        let filename = part.header().filename().unwrap_or_default();
        let destination = destination_path(config.upload_root(), filename)?;
        let content_type = part.header().content_type().map(|mime| mime.to_string());

        let mut file = File::create(&destination).await.map_err(|e| {
            error!(cause = %e, file = %destination.display(), "failed to create upload file");
            UploadError::internal(e)
        })?;

        let expected = part.len();
        let size = part.copy_to(&mut file, config.buffer_size()).await.map_err(|e| {
            error!(cause = %e, file = %destination.display(), "failed to write upload file");
            UploadError::from(e)
        })?;
        debug_assert_eq!(size, expected);

        info!(file = %destination.display(), size, "saved upload");
        let name = destination.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        files.push(SavedFile { name, size, content_type });
    }

    Ok(UploadSummary { files })
}

/// A [`Handler`] answering multipart uploads.
///
/// Success is `200` with a JSON [`UploadSummary`]; failures are answered with the status of
/// [`UploadError::status_code`] and a plain text message.
#[derive(Debug, Clone)]
pub struct UploadHandler {
    config: Arc<UploadConfig>,
}

impl UploadHandler {
    pub fn new(config: UploadConfig) -> Self {
        Self { config: Arc::new(config) }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }
}

#[async_trait]
impl Handler for UploadHandler {
    async fn call(&self, req: Request<Body>) -> HandlerResult {
        match handle_upload(req, &self.config).await {
            Ok(summary) => {
                let body = serde_json::to_vec(&summary)?;
                Ok(Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::from(body))?)
            }
            Err(e) => {
                let status = e.status_code();
                warn!(cause = %e, status = status.as_u16(), "upload failed");

                let mut builder = Response::builder().status(status).header(CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref());
                if matches!(e, UploadError::MethodNotAllowed { .. }) {
                    builder = builder.header(ALLOW, Method::POST.as_str());
                }
                Ok(builder.body(Body::from(e.to_string()))?)
            }
        }
    }
}
