//! In-process single-producer, single-consumer byte pipe.
//!
//! The pipe has no buffer of its own: a write completes only after the reader asked for
//! the next chunk, so a slow reader throttles a fast writer and at most one chunk is in
//! flight at any time.
//!
//! # Architecture
//!
//! Like the request body channel of the server, the two ends talk through a handshake:
//! - the [`PipeReader`] sends a oneshot responder over an mpsc channel whenever it needs data
//! - the [`PipeWriter`] waits for a responder and answers it with the next chunk
//! - a second oneshot carries the way the writer finished (graceful close or error)
//!
//! When the writer goes away, pending responders are dropped and the reader falls back
//! to the outcome channel. When the reader goes away, the writer's mpsc receiver is
//! closed and every further write fails with [`TransferError::ClosedPipe`].
//!
//! Neither end is `Clone`, and writes take `&mut self`, so a second concurrent writer or
//! reader cannot be expressed.

use std::cmp;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, StreamExt};
use http_body::{Body, Frame};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{trace, warn};

use crate::protocol::TransferError;

type Responder = oneshot::Sender<Bytes>;
type Outcome = Result<(), TransferError>;

/// Creates a connected writer/reader pair.
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (signal_sender, signal_receiver) = mpsc::channel(0);
    let (outcome_sender, outcome_receiver) = oneshot::channel();

    let writer = PipeWriter { signal: signal_receiver, outcome: Some(outcome_sender) };
    let reader =
        PipeReader { signal: signal_sender, receiving: None, outcome: outcome_receiver, pending: Bytes::new(), finished: false };

    (writer, reader)
}

/// The producing end of a [`pipe`].
#[derive(Debug)]
pub struct PipeWriter {
    signal: mpsc::Receiver<Responder>,
    outcome: Option<oneshot::Sender<Outcome>>,
}

impl PipeWriter {
    /// Hands `bytes` to the reader, suspending until the reader asks for data.
    ///
    /// Fails with [`TransferError::ClosedPipe`] once the reader is closed or dropped.
    pub async fn write(&mut self, bytes: impl Into<Bytes>) -> Result<usize, TransferError> {
        let bytes = bytes.into();
        if self.outcome.is_none() {
            return Err(TransferError::ClosedPipe);
        }
        if bytes.is_empty() {
            return Ok(0);
        }

        let len = bytes.len();
        let responder = poll_fn(|cx| self.poll_responder(cx)).await?;
        responder.send(bytes).map_err(|_bytes| TransferError::ClosedPipe)?;
        trace!(len, "wrote chunk to pipe");
        Ok(len)
    }

    /// Signals a graceful end-of-stream to the reader.
    pub fn close(mut self) {
        self.finish(Ok(()));
    }

    /// Ends the stream with `error`; the reader observes it instead of end-of-stream.
    pub fn close_with_error(mut self, error: TransferError) {
        self.finish(Err(error));
    }

    fn poll_responder(&mut self, cx: &mut Context<'_>) -> Poll<Result<Responder, TransferError>> {
        if self.outcome.is_none() {
            return Poll::Ready(Err(TransferError::ClosedPipe));
        }

        match ready!(self.signal.poll_next_unpin(cx)) {
            Some(responder) => Poll::Ready(Ok(responder)),
            None => Poll::Ready(Err(TransferError::ClosedPipe)),
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        let Some(outcome_sender) = self.outcome.take() else {
            return;
        };

        // the reader may already be gone, nobody left to tell
        let _ = outcome_sender.send(outcome);

        // dropping queued responders wakes a reader that is waiting for data
        self.signal.close();
        while let Ok(Some(_responder)) = self.signal.try_next() {}
    }
}

impl AsyncWrite for PipeWriter {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let responder = ready!(this.poll_responder(cx))?;
        responder.send(Bytes::copy_from_slice(buf)).map_err(|_bytes| io::Error::from(TransferError::ClosedPipe))?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().finish(Ok(()));
        Poll::Ready(Ok(()))
    }
}

/// The consuming end of a [`pipe`].
///
/// Usable both as `AsyncRead` and as an `http_body::Body`, so it can be handed to a
/// transport as a request body.
#[derive(Debug)]
pub struct PipeReader {
    signal: mpsc::Sender<Responder>,
    receiving: Option<oneshot::Receiver<Bytes>>,
    outcome: oneshot::Receiver<Outcome>,
    pending: Bytes,
    finished: bool,
}

impl PipeReader {
    /// Stops reading; pending and future writes fail with [`TransferError::ClosedPipe`].
    pub fn close(self) {}

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes, TransferError>>> {
        loop {
            if self.finished {
                return Poll::Ready(None);
            }

            if let Some(receiving) = &mut self.receiving {
                match ready!(receiving.poll_unpin(cx)) {
                    Ok(bytes) => {
                        self.receiving.take();
                        if bytes.is_empty() {
                            continue;
                        }
                        return Poll::Ready(Some(Ok(bytes)));
                    }
                    Err(_canceled) => {
                        self.receiving.take();
                        return self.poll_outcome(cx);
                    }
                }
            }

            match ready!(self.signal.poll_ready(cx)) {
                Ok(()) => {
                    let (tx, rx) = oneshot::channel();
                    if self.signal.start_send(tx).is_err() {
                        return self.poll_outcome(cx);
                    }
                    self.receiving = Some(rx);
                }
                Err(_disconnected) => return self.poll_outcome(cx),
            }
        }
    }

    fn poll_outcome(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes, TransferError>>> {
        let outcome = ready!(self.outcome.poll_unpin(cx));
        self.finished = true;

        match outcome {
            Ok(Ok(())) => Poll::Ready(None),
            Ok(Err(e)) => Poll::Ready(Some(Err(e))),
            Err(_canceled) => {
                warn!("pipe writer dropped without close");
                Poll::Ready(Some(Err(TransferError::producer("pipe writer dropped without close"))))
            }
        }
    }
}

impl AsyncRead for PipeReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.pending.is_empty() {
            match ready!(this.poll_chunk(cx)) {
                Some(Ok(bytes)) => this.pending = bytes,
                Some(Err(e)) => return Poll::Ready(Err(e.into())),
                None => return Poll::Ready(Ok(())),
            }
        }

        let len = cmp::min(this.pending.len(), buf.remaining());
        buf.put_slice(&this.pending.split_to(len));
        Poll::Ready(Ok(()))
    }
}

impl Body for PipeReader {
    type Data = Bytes;
    type Error = TransferError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if !this.pending.is_empty() {
            return Poll::Ready(Some(Ok(Frame::data(std::mem::take(&mut this.pending)))));
        }

        this.poll_chunk(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }

    fn is_end_stream(&self) -> bool {
        self.finished && self.pending.is_empty()
    }
}
