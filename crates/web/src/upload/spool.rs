//! Holding area for file parts while the rest of the body is still being validated.
//!
//! Part content stays in memory while the per-request budget allows it, and moves to an
//! anonymous temporary file once it does not.

use bytes::{Bytes, BytesMut};
use relay_http::protocol::{PartHeader, TransferError};
use relay_http::transfer::transfer;
use std::io;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

#[derive(Debug)]
pub(crate) struct SpooledPart {
    header: PartHeader,
    len: u64,
    content: Spool,
}

#[derive(Debug)]
enum Spool {
    Memory(BytesMut),
    File(File),
}

impl SpooledPart {
    pub(crate) fn new(header: PartHeader) -> Self {
        Self { header, len: 0, content: Spool::Memory(BytesMut::new()) }
    }

    pub(crate) fn header(&self) -> &PartHeader {
        &self.header
    }

    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    pub(crate) fn is_in_memory(&self) -> bool {
        matches!(self.content, Spool::Memory(_))
    }

    /// Appends part data, charging in-memory bytes to `memory_budget`.
    pub(crate) async fn append(&mut self, bytes: Bytes, memory_budget: &mut usize) -> io::Result<()> {
        self.len += bytes.len() as u64;

        match &mut self.content {
            Spool::Memory(buffer) if bytes.len() <= *memory_budget => {
                *memory_budget -= bytes.len();
                buffer.extend_from_slice(&bytes);
            }
            Spool::Memory(buffer) => {
                let mut file = spool_file().await?;
                file.write_all(buffer).await?;
                file.write_all(&bytes).await?;

                debug!(filename = ?self.header.filename(), spilled = buffer.len(), "spool part to temporary file");
                *memory_budget += buffer.len();
                self.content = Spool::File(file);
            }
            Spool::File(file) => file.write_all(&bytes).await?,
        }

        Ok(())
    }

    /// Prepares the spooled content to be read back from the start.
    pub(crate) async fn finish(mut self) -> io::Result<Self> {
        if let Spool::File(file) = &mut self.content {
            file.flush().await?;
            file.rewind().await?;
        }
        Ok(self)
    }

    /// Copies the spooled content into `sink`, returning the number of bytes copied.
    pub(crate) async fn copy_to<W>(self, sink: &mut W, buffer_size: usize) -> Result<u64, TransferError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        match self.content {
            Spool::Memory(buffer) => transfer(&mut &buffer[..], sink, buffer_size).await,
            Spool::File(mut file) => transfer(&mut file, sink, buffer_size).await,
        }
    }
}

async fn spool_file() -> io::Result<File> {
    let file = tokio::task::spawn_blocking(tempfile::tempfile).await.map_err(io::Error::other)??;
    Ok(File::from_std(file))
}
