//! Bounded-buffer copying of streamed bodies.
//!
//! Everything that drains a body goes through [`transfer`]: one buffer of a fixed
//! size is allocated per call and reused for every read, so the memory used by a copy
//! does not depend on how many bytes flow through it.

use std::io;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tracing::{error, trace};

use crate::ensure;
use crate::protocol::{BoxError, TransferError};

/// Buffer size for line oriented reads.
pub const LINE_BUFFER_SIZE: usize = 1024;

/// Buffer size for bulk copies.
pub const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Longest line accepted by [`read_lines`].
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Copies `source` into `sink` through a single buffer of `buffer_size` bytes.
///
/// Reads until the source reports end-of-stream, writes every filled (or, at the end,
/// partial) buffer to the sink and flushes it. Returns the number of bytes copied.
///
/// Bytes already written to the sink are not rolled back when a later read or write
/// fails; callers that need atomic output should write to a temporary location.
pub async fn transfer<R, W>(source: &mut R, sink: &mut W, buffer_size: usize) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    ensure!(buffer_size > 0, TransferError::io(io::Error::new(io::ErrorKind::InvalidInput, "buffer size must be positive")));

    let mut buffer = vec![0u8; buffer_size];
    let mut copied: u64 = 0;

    loop {
        let n = match source.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!(cause = %e, copied, "failed to read from transfer source");
                return Err(e.into());
            }
        };

        if let Err(e) = sink.write_all(&buffer[..n]).await {
            error!(cause = %e, copied, "failed to write to transfer sink");
            return Err(e.into());
        }

        copied += n as u64;
        trace!(len = n, copied, "transferred chunk");
    }

    sink.flush().await?;
    Ok(copied)
}

/// Relays a streamed body into `sink` through a bounded buffer.
pub async fn drain_body<B, W>(body: B, sink: &mut W, buffer_size: usize) -> Result<u64, TransferError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut reader = body_reader(body);
    transfer(&mut reader, sink, buffer_size).await
}

/// Reads a streamed body line by line.
///
/// Lines may span any number of body chunks; the terminating `\n` (and a preceding
/// `\r`) is stripped. A line longer than [`MAX_LINE_LENGTH`] fails with
/// [`TransferError::LineTooLong`].
pub fn read_lines<B>(body: B) -> impl Stream<Item = Result<String, TransferError>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    FramedRead::with_capacity(body_reader(body), LinesCodec::new_with_max_length(MAX_LINE_LENGTH), LINE_BUFFER_SIZE).map_err(
        |e| match e {
            LinesCodecError::MaxLineLengthExceeded => TransferError::LineTooLong { max_length: MAX_LINE_LENGTH },
            LinesCodecError::Io(e) => TransferError::from(e),
        },
    )
}

/// Adapts a body into an `AsyncRead`, carrying body errors inside `io::Error`.
pub fn body_reader<B>(body: B) -> impl AsyncRead + Unpin
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let stream = Box::pin(body).into_data_stream().map_err(|e| {
        let e: BoxError = e.into();
        io::Error::other(e)
    });
    StreamReader::new(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use http_body::Frame;
    use http_body_util::{Full, StreamBody};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    fn source_of(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_transfer_preserves_bytes_for_any_buffer_size() {
        let source = source_of(10_000);

        for buffer_size in [1, 2, 7, 1024, 9_999, 10_000, 10_001, COPY_BUFFER_SIZE] {
            let mut reader = &source[..];
            let mut sink = Vec::new();

            let copied = transfer(&mut reader, &mut sink, buffer_size).await.unwrap();

            assert_eq!(copied, source.len() as u64, "buffer size {buffer_size}");
            assert_eq!(sink, source, "buffer size {buffer_size}");
        }
    }

    #[tokio::test]
    async fn test_transfer_empty_source() {
        let mut reader: &[u8] = &[];
        let mut sink = Vec::new();

        assert_eq!(transfer(&mut reader, &mut sink, 16).await.unwrap(), 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_rejects_zero_buffer() {
        let mut reader: &[u8] = b"hello";
        let mut sink = Vec::new();

        let result = transfer(&mut reader, &mut sink, 0).await;
        assert!(matches!(result, Err(TransferError::Io { source }) if source.kind() == io::ErrorKind::InvalidInput));
    }

    /// Yields `data` once, then fails.
    struct FailingReader {
        data: Option<&'static [u8]>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))),
            }
        }
    }

    #[tokio::test]
    async fn test_transfer_read_failure_keeps_partial_output() {
        let mut reader = FailingReader { data: Some(b"partial") };
        let mut sink = Vec::new();

        let result = transfer(&mut reader, &mut sink, 64).await;

        assert!(matches!(result, Err(TransferError::Io { source }) if source.kind() == io::ErrorKind::ConnectionReset));
        assert_eq!(sink, b"partial");
    }

    #[tokio::test]
    async fn test_transfer_write_failure() {
        let mut reader: &[u8] = b"more than four bytes";
        let mut buf = [0u8; 4];
        let mut sink = std::io::Cursor::new(&mut buf[..]);

        let result = transfer(&mut reader, &mut sink, 8).await;
        assert!(matches!(result, Err(TransferError::Io { source }) if source.kind() == io::ErrorKind::WriteZero));
    }

    #[tokio::test]
    async fn test_drain_body() {
        let source = source_of(100_000);
        let body = Full::new(Bytes::from(source.clone()));
        let mut sink = Vec::new();

        let copied = drain_body(body, &mut sink, COPY_BUFFER_SIZE).await.unwrap();

        assert_eq!(copied, 100_000);
        assert_eq!(sink, source);
    }

    #[tokio::test]
    async fn test_drain_body_error() {
        let frames: Vec<Result<Frame<Bytes>, io::Error>> =
            vec![Ok(Frame::data(Bytes::from_static(b"abc"))), Err(io::Error::new(io::ErrorKind::UnexpectedEof, "cut"))];
        let body = StreamBody::new(futures::stream::iter(frames));
        let mut sink = Vec::new();

        let result = drain_body(body, &mut sink, 2).await;

        assert!(matches!(result, Err(TransferError::Io { .. })));
        assert_eq!(sink, b"abc");
    }

    #[tokio::test]
    async fn test_read_lines_across_chunks() {
        let frames: Vec<Result<Frame<Bytes>, io::Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"li"))),
            Ok(Frame::data(Bytes::from_static(b"ne1\r\nline2\nli"))),
            Ok(Frame::data(Bytes::from_static(b"ne3"))),
        ];
        let body = StreamBody::new(futures::stream::iter(frames));

        let lines: Vec<String> = read_lines(body).map(Result::unwrap).collect().await;

        assert_eq!(lines, vec!["line1", "line2", "line3"]);
    }

    #[tokio::test]
    async fn test_read_lines_too_long() {
        let body = Full::new(Bytes::from(vec![b'a'; MAX_LINE_LENGTH + 1]));

        let mut lines = Box::pin(read_lines(body));

        assert!(matches!(lines.next().await, Some(Err(TransferError::LineTooLong { .. }))));
    }
}
