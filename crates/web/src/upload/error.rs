use http::{Method, StatusCode};
use relay_http::protocol::{MultipartError, TransferError};
use std::io;
use thiserror::Error;

/// Reasons an upload request is refused or fails.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("method {method} not allowed, expect POST")]
    MethodNotAllowed { method: Method },

    #[error("malformed multipart body: {source}")]
    BadRequest { source: MultipartError },

    #[error("request body exceed the limit {max_total_bytes}")]
    PayloadTooLarge { max_total_bytes: usize },

    #[error("invalid file path: {filename}")]
    InvalidPath { filename: String },

    #[error("failed to store upload: {source}")]
    Internal { source: io::Error },
}

impl UploadError {
    pub fn invalid_path<S: ToString>(filename: S) -> Self {
        Self::InvalidPath { filename: filename.to_string() }
    }

    pub fn internal<E: Into<io::Error>>(e: E) -> Self {
        Self::Internal { source: e.into() }
    }

    /// Maps a multipart decoding failure, given the configured body ceiling.
    pub fn from_multipart(e: MultipartError, max_total_bytes: usize) -> Self {
        match e {
            MultipartError::PayloadTooLarge => Self::PayloadTooLarge { max_total_bytes },
            source => Self::BadRequest { source },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest { .. } | Self::InvalidPath { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        Self::internal(e)
    }
}

impl From<io::Error> for UploadError {
    fn from(e: io::Error) -> Self {
        Self::internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (UploadError::MethodNotAllowed { method: Method::GET }, StatusCode::METHOD_NOT_ALLOWED),
            (UploadError::BadRequest { source: MultipartError::Incomplete }, StatusCode::BAD_REQUEST),
            (UploadError::PayloadTooLarge { max_total_bytes: 1 }, StatusCode::PAYLOAD_TOO_LARGE),
            (UploadError::invalid_path("../x"), StatusCode::BAD_REQUEST),
            (UploadError::internal(io::Error::other("disk full")), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error}");
        }
    }

    #[test]
    fn test_from_multipart() {
        assert!(matches!(
            UploadError::from_multipart(MultipartError::PayloadTooLarge, 10),
            UploadError::PayloadTooLarge { max_total_bytes: 10 }
        ));
        assert!(matches!(
            UploadError::from_multipart(MultipartError::MissingBoundary, 10),
            UploadError::BadRequest { source: MultipartError::MissingBoundary }
        ));
    }
}
