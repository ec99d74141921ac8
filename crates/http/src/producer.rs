//! Outbound requests whose body is produced while it is being sent.
//!
//! [`StreamingRequestProducer`] builds an `http::Request` whose body is the reading end
//! of a [`pipe`]. A background task pulls chunks from a stream and writes them into the
//! pipe, so a transport can start transmitting as soon as the first chunk exists.
//!
//! Failures travel both ways:
//! - a failing chunk closes the pipe with [`TransferError::Producer`], which the transport
//!   observes as a body error
//! - a transport that drops the body makes the next write fail with
//!   [`TransferError::ClosedPipe`], ending the task
//!
//! ```no_run
//! # async fn send(request: http::Request<relay_http::pipe::PipeReader>) {}
//! # async fn run() -> Result<(), relay_http::protocol::ProducerError> {
//! use relay_http::producer::StreamingRequestProducer;
//!
//! let (request, handle) = StreamingRequestProducer::post("http://localhost:3333/upload")
//!     .header(http::header::CONTENT_TYPE, "text/plain")
//!     .spawn_iter(["line1", "line2", "line3"])?;
//!
//! send(request).await;
//! let produced = handle.join().await?;
//! # Ok(())
//! # }
//! ```

use std::convert::Infallible;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::header::{HeaderName, HeaderValue};
use http::request::Builder;
use http::{Method, Request, Uri};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::pipe::{pipe, PipeReader, PipeWriter};
use crate::protocol::{BoxError, ProducerError, TransferError};

/// Builder of a request whose body is streamed from a background task.
#[derive(Debug)]
pub struct StreamingRequestProducer {
    builder: Builder,
}

impl StreamingRequestProducer {
    pub fn new<U>(method: Method, uri: U) -> Self
    where
        Uri: TryFrom<U>,
        <Uri as TryFrom<U>>::Error: Into<http::Error>,
    {
        Self { builder: Request::builder().method(method).uri(uri) }
    }

    pub fn post<U>(uri: U) -> Self
    where
        Uri: TryFrom<U>,
        <Uri as TryFrom<U>>::Error: Into<http::Error>,
    {
        Self::new(Method::POST, uri)
    }

    pub fn put<U>(uri: U) -> Self
    where
        Uri: TryFrom<U>,
        <Uri as TryFrom<U>>::Error: Into<http::Error>,
    {
        Self::new(Method::PUT, uri)
    }

    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.builder = self.builder.header(key, value);
        self
    }

    /// Builds the request and starts a task writing `chunks` into its body.
    ///
    /// `chunks` is consumed exactly once. Must be called within a tokio runtime.
    pub fn spawn<S, B, E>(self, chunks: S) -> Result<(Request<PipeReader>, ProducerHandle), ProducerError>
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Bytes> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let (writer, reader) = pipe();
        let request = self.builder.body(reader)?;

        let task = tokio::spawn(produce(writer, chunks));
        Ok((request, ProducerHandle { task }))
    }

    /// Like [`spawn`](Self::spawn), for chunks that are already in memory.
    pub fn spawn_iter<I>(self, chunks: I) -> Result<(Request<PipeReader>, ProducerHandle), ProducerError>
    where
        I: IntoIterator,
        I::Item: Into<Bytes> + Send + 'static,
        I::IntoIter: Send + 'static,
    {
        self.spawn(futures::stream::iter(chunks.into_iter().map(Ok::<_, Infallible>)))
    }
}

/// Handle on the background task feeding a streamed request body.
#[derive(Debug)]
pub struct ProducerHandle {
    task: JoinHandle<Result<u64, TransferError>>,
}

impl ProducerHandle {
    /// Waits for the producer and returns the number of body bytes it wrote.
    pub async fn join(self) -> Result<u64, ProducerError> {
        Ok(self.task.await??)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the producer; the reader observes a failed body.
    pub fn abort(&self) {
        self.task.abort();
    }
}

async fn produce<S, B, E>(mut writer: PipeWriter, chunks: S) -> Result<u64, TransferError>
where
    S: Stream<Item = Result<B, E>>,
    B: Into<Bytes>,
    E: Into<BoxError>,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut produced: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                let reason = e.into().to_string();
                error!(cause = %reason, produced, "failed to produce request body");
                writer.close_with_error(TransferError::producer(&reason));
                return Err(TransferError::producer(reason));
            }
        };

        match writer.write(bytes).await {
            Ok(len) => produced += len as u64,
            Err(e) => {
                warn!(cause = %e, produced, "request body consumer went away");
                return Err(e);
            }
        }
    }

    writer.close();
    debug!(produced, "finished producing request body");
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use http_body_util::BodyExt;
    use std::io;

    #[tokio::test]
    async fn test_streams_all_chunks() {
        let (request, handle) = StreamingRequestProducer::post("http://localhost/upload")
            .header(CONTENT_TYPE, "text/plain")
            .spawn_iter(["line1", "line2", "line3"])
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().path(), "/upload");
        assert_eq!(request.headers()[CONTENT_TYPE], "text/plain");

        let body = request.into_body().collect().await.unwrap().to_bytes();

        assert_eq!(&body[..], b"line1line2line3");
        assert_eq!(handle.join().await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_producer_failure_reaches_consumer() {
        let chunks: Vec<Result<&'static str, io::Error>> =
            vec![Ok("first"), Err(io::Error::other("disk gone")), Ok("never sent")];

        let (request, handle) = StreamingRequestProducer::post("/upload").spawn(futures::stream::iter(chunks)).unwrap();

        let result = request.into_body().collect().await;

        assert!(matches!(result, Err(TransferError::Producer { reason }) if reason == "disk gone"));
        assert!(matches!(handle.join().await, Err(ProducerError::Transfer { source: TransferError::Producer { .. } })));
    }

    #[tokio::test]
    async fn test_consumer_abort_stops_producer() {
        // an endless producer only terminates because the reader goes away
        let chunks = futures::stream::repeat_with(|| Ok::<_, Infallible>(Bytes::from_static(b"chunk")));

        let (request, handle) = StreamingRequestProducer::post("/upload").spawn(chunks).unwrap();

        let mut body = request.into_body();
        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(&first[..], b"chunk");
        drop(body);

        assert!(matches!(handle.join().await, Err(ProducerError::Transfer { source: TransferError::ClosedPipe })));
    }

    #[tokio::test]
    async fn test_abort_fails_the_body() {
        let chunks = futures::stream::pending::<Result<Bytes, Infallible>>();

        let (request, handle) = StreamingRequestProducer::post("/upload").spawn(chunks).unwrap();
        assert!(!handle.is_finished());

        handle.abort();
        let result = request.into_body().collect().await;

        assert!(matches!(result, Err(TransferError::Producer { .. })));
        assert!(matches!(handle.join().await, Err(ProducerError::Join { source }) if source.is_cancelled()));
    }

    #[tokio::test]
    async fn test_invalid_header_is_rejected() {
        let result = StreamingRequestProducer::post("/upload").header("bad header", "value").spawn_iter(["x"]);

        assert!(matches!(result, Err(ProducerError::Request { .. })));
    }
}
