use std::error::Error;
use std::io;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Errors raised while moving body bytes between a source and a sink.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("write on closed pipe")]
    ClosedPipe,

    #[error("body producer failed: {reason}")]
    Producer { reason: String },

    #[error("line length exceed the limit {max_length}")]
    LineTooLong { max_length: usize },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io { source: io::Error },
}

impl TransferError {
    pub fn producer<S: ToString>(str: S) -> Self {
        Self::Producer { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::from(e.into())
    }

    #[inline]
    pub fn is_closed_pipe(&self) -> bool {
        matches!(self, Self::ClosedPipe)
    }
}

/// Unwraps a `TransferError` that travelled through an `AsyncRead`/`AsyncWrite`
/// boundary as the payload of an `io::Error`.
impl From<io::Error> for TransferError {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<TransferError>()) {
            return Self::Io { source: e };
        }

        match e.into_inner().map(|inner| inner.downcast::<TransferError>()) {
            Some(Ok(transfer_error)) => *transfer_error,
            _ => Self::invalid_body("lost transfer error inside io error"),
        }
    }
}

impl From<TransferError> for io::Error {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io { source } => source,
            TransferError::ClosedPipe => io::Error::new(io::ErrorKind::BrokenPipe, TransferError::ClosedPipe),
            e => io::Error::other(e),
        }
    }
}

/// Errors raised while decoding a `multipart/form-data` body.
#[derive(Error, Debug)]
pub enum MultipartError {
    #[error("invalid content type: {reason}")]
    InvalidContentType { reason: String },

    #[error("missing multipart boundary")]
    MissingBoundary,

    #[error("invalid multipart boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("part header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("part header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid part header: {reason}")]
    InvalidHeader { reason: String },

    #[error("multipart body ended before the closing boundary")]
    Incomplete,

    #[error("payload exceed the limit")]
    PayloadTooLarge,

    #[error("io error: {source}")]
    Io { source: io::Error },
}

impl MultipartError {
    pub fn invalid_content_type<S: ToString>(str: S) -> Self {
        Self::InvalidContentType { reason: str.to_string() }
    }

    pub fn invalid_boundary<S: ToString>(str: S) -> Self {
        Self::InvalidBoundary { reason: str.to_string() }
    }

    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::from(e.into())
    }
}

/// `http_body_util::Limited` reports an exceeded ceiling as `LengthLimitError`, which
/// reaches the decoder wrapped in the reader's `io::Error`.
impl From<io::Error> for MultipartError {
    fn from(e: io::Error) -> Self {
        if e.get_ref().is_some_and(|inner| inner.is::<http_body_util::LengthLimitError>()) {
            return Self::PayloadTooLarge;
        }
        Self::Io { source: e }
    }
}

/// Errors raised while building a streamed request.
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("invalid request: {source}")]
    Request {
        #[from]
        source: http::Error,
    },

    #[error("producer task failed: {source}")]
    Transfer {
        #[from]
        source: TransferError,
    },

    #[error("producer task panicked or was cancelled: {source}")]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
}
