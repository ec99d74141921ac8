//! Streams a multipart upload from a background producer through a middleware chain into
//! a temporary upload directory, then reads the stored file back line by line.
//!
//! ```text
//! cargo run -p relay-web --example upload_pipeline
//! ```

use bytes::Bytes;
use futures::StreamExt;
use http::header::CONTENT_TYPE;
use http_body_util::{BodyExt, Full};
use relay_http::producer::StreamingRequestProducer;
use relay_http::protocol::BoxError;
use relay_http::transfer::read_lines;
use relay_web::middleware::{BearerAuth, Cors, Middleware, MiddlewareChain, Timing};
use relay_web::upload::{UploadConfig, UploadHandler, UploadSummary};
use relay_web::{Body, Handler};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

const BOUNDARY: &str = "upload-pipeline";
const TOKEN: &str = "pipeline-token";

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let upload_root = tempfile::tempdir()?;
    let upload = UploadHandler::new(UploadConfig::builder(upload_root.path()).max_total_bytes(1024 * 1024).build());

    let handler = MiddlewareChain::new()
        .and_then(Timing::new())
        .and_then(Cors::default())
        .and_then(BearerAuth::new(TOKEN))
        .wrap(upload);

    let chunks = vec![
        Bytes::from(format!("--{BOUNDARY}\r\n")),
        Bytes::from_static(b"Content-Disposition: form-data; name=\"files\"; filename=\"lines.txt\"\r\n\r\n"),
        Bytes::from_static(b"line1\n"),
        Bytes::from_static(b"line2\n"),
        Bytes::from_static(b"line3\n"),
        Bytes::from(format!("\r\n--{BOUNDARY}--\r\n")),
    ];

    let (request, producer) = StreamingRequestProducer::post("/upload")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(http::header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .spawn_iter(chunks)?;

    let response = handler.call(request.map(Body::stream)).await?;
    let produced = producer.join().await?;
    info!(status = %response.status(), produced, "upload answered");

    let bytes = response.into_body().collect().await?.to_bytes();
    let summary: UploadSummary = serde_json::from_slice(&bytes)?;

    for file in &summary.files {
        let content = tokio::fs::read(upload_root.path().join(&file.name)).await?;
        let mut lines = Box::pin(read_lines(Full::new(Bytes::from(content))));
        while let Some(line) = lines.next().await {
            info!(file = %file.name, line = %line?, "stored line");
        }
    }

    Ok(())
}
