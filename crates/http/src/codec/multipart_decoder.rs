//! Streaming decoder for `multipart/form-data` bodies.
//!
//! The body is a sequence of parts separated by boundary lines, as defined in
//! [RFC 2046 Section 5.1](https://tools.ietf.org/html/rfc2046#section-5.1) and
//! [RFC 7578](https://tools.ietf.org/html/rfc7578):
//!
//! ```text
//! preamble\r\n
//! --boundary\r\n
//! Content-Disposition: form-data; name="files"; filename="a.txt"\r\n
//! \r\n
//! part data\r\n
//! --boundary--\r\n
//! epilogue
//! ```
//!
//! The decoder never needs a whole part in memory: part data is emitted as soon as it
//! is known not to contain the start of a delimiter.

use bytes::{Buf, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue};
use httparse::Status;
use mime::Mime;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{Message, MultipartError, PartHeader, PayloadItem};

/// Maximum number of header fields allowed in one part
const MAX_HEADER_NUM: usize = 16;

/// Maximum size in bytes of the header block of one part
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Maximum boundary length, see RFC 2046 Section 5.1.1
const MAX_BOUNDARY_LEN: usize = 70;

/// A decoder turning a `multipart/form-data` body into part headers and part data.
///
/// Produces, for every part:
/// - one `Message::Header(PartHeader)`
/// - any number of `Message::Payload(PayloadItem::Chunk(bytes))`
/// - one `Message::Payload(PayloadItem::Eof)` marking the end of the part
///
/// After the closing boundary the decoder yields nothing and discards the epilogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartDecoder {
    state: State,
    /// `--boundary`, opening the first part
    dash_boundary: Bytes,
    /// `\r\n--boundary`, closing a part
    delimiter: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Expect `--boundary` at the current position, at the body start or after a CRLF
    FirstBoundary,
    /// Skip everything before the first boundary
    Preamble,
    /// Read the header block of a part
    Headers,
    /// Read part data up to the next delimiter
    Body,
    /// The closing boundary has been read
    Finished,
}

impl MultipartDecoder {
    /// Creates a decoder for the given boundary.
    pub fn new(boundary: &str) -> Result<Self, MultipartError> {
        ensure!(!boundary.is_empty(), MultipartError::invalid_boundary("empty boundary"));
        ensure!(
            boundary.len() <= MAX_BOUNDARY_LEN,
            MultipartError::invalid_boundary(format!("boundary length {} exceed the limit {MAX_BOUNDARY_LEN}", boundary.len()))
        );

        let dash_boundary = Bytes::from(format!("--{boundary}"));
        let delimiter = Bytes::from(format!("\r\n--{boundary}"));
        Ok(Self { state: State::FirstBoundary, dash_boundary, delimiter })
    }

    /// Creates a decoder from a `Content-Type: multipart/form-data; boundary=...` value.
    pub fn from_content_type(content_type: &HeaderValue) -> Result<Self, MultipartError> {
        let mime: Mime = content_type
            .to_str()
            .map_err(MultipartError::invalid_content_type)?
            .parse()
            .map_err(MultipartError::invalid_content_type)?;

        ensure!(
            mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA,
            MultipartError::invalid_content_type(format!("expect multipart/form-data, but got {mime}"))
        );

        let boundary = mime.get_param(mime::BOUNDARY).ok_or(MultipartError::MissingBoundary)?;
        Self::new(boundary.as_str())
    }

    /// Returns true once the closing boundary has been decoded.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    fn decode_first_boundary(&mut self, src: &mut BytesMut) -> Result<bool, MultipartError> {
        let len = src.len().min(self.dash_boundary.len());
        if src[..len] != self.dash_boundary[..len] {
            self.state = State::Preamble;
            return Ok(true);
        }
        if len < self.dash_boundary.len() {
            return Ok(false);
        }

        match boundary_suffix(&src[len..])? {
            Some((suffix_len, next_state)) => {
                src.advance(len + suffix_len);
                self.state = next_state;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Discards the preamble up to a boundary that starts a line.
    fn decode_preamble(&mut self, src: &mut BytesMut) -> Result<bool, MultipartError> {
        let Some(index) = find(src, &self.delimiter) else {
            // keep a tail that may be the beginning of the delimiter
            let keep = self.delimiter.len() - 1;
            if src.len() > keep {
                src.advance(src.len() - keep);
            }
            return Ok(false);
        };

        src.advance(index + 2);
        self.state = State::FirstBoundary;
        Ok(true)
    }

    fn decode_headers(&mut self, src: &mut BytesMut) -> Result<Option<PartHeader>, MultipartError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];

        let (header_size, header_map) = match httparse::parse_headers(src, &mut headers) {
            Ok(Status::Complete((header_size, parsed))) => {
                ensure!(header_size <= MAX_HEADER_BYTES, MultipartError::too_large_header(header_size, MAX_HEADER_BYTES));

                let mut header_map = HeaderMap::with_capacity(parsed.len());
                for header in parsed {
                    let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(MultipartError::invalid_header)?;
                    let value = HeaderValue::from_bytes(header.value).map_err(MultipartError::invalid_header)?;
                    header_map.append(name, value);
                }
                (header_size, header_map)
            }
            Ok(Status::Partial) => {
                ensure!(src.len() <= MAX_HEADER_BYTES, MultipartError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
            Err(httparse::Error::TooManyHeaders) => return Err(MultipartError::too_many_headers(MAX_HEADER_NUM)),
            Err(e) => return Err(MultipartError::invalid_header(e)),
        };

        src.advance(header_size);
        trace!(header_size, "parsed part header");
        PartHeader::from_headers(header_map).map(Some)
    }

    fn decode_body(&mut self, src: &mut BytesMut) -> Result<Option<PayloadItem>, MultipartError> {
        match find(src, &self.delimiter) {
            Some(0) => {
                let end = self.delimiter.len();
                match boundary_suffix(&src[end..])? {
                    Some((suffix_len, next_state)) => {
                        src.advance(end + suffix_len);
                        self.state = next_state;
                        Ok(Some(PayloadItem::Eof))
                    }
                    None => Ok(None),
                }
            }

            Some(index) => Ok(Some(PayloadItem::Chunk(src.split_to(index).freeze()))),

            None => {
                // the tail may be the beginning of a delimiter
                let keep = self.delimiter.len() - 1;
                if src.len() <= keep {
                    return Ok(None);
                }
                let len = src.len() - keep;
                Ok(Some(PayloadItem::Chunk(src.split_to(len).freeze())))
            }
        }
    }
}

impl Decoder for MultipartDecoder {
    type Item = Message<PartHeader>;
    type Error = MultipartError;

    /// Decodes the next header, data chunk or end-of-part marker.
    ///
    /// # Returns
    /// - `Ok(Some(Message::Header(header)))` when a part header is complete
    /// - `Ok(Some(Message::Payload(PayloadItem::Chunk(bytes))))` for part data
    /// - `Ok(Some(Message::Payload(PayloadItem::Eof)))` at the end of a part
    /// - `Ok(None)` when more data is needed, or after the closing boundary
    /// - `Err(MultipartError)` if the body is not valid multipart
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::FirstBoundary => {
                    if !self.decode_first_boundary(src)? {
                        return Ok(None);
                    }
                }
                State::Preamble => {
                    if !self.decode_preamble(src)? {
                        return Ok(None);
                    }
                }
                State::Headers => return Ok(self.decode_headers(src)?.map(Message::Header)),
                State::Body => return Ok(self.decode_body(src)?.map(Message::Payload)),
                State::Finished => {
                    // epilogue
                    src.clear();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if self.is_finished() => Ok(None),
            None => Err(MultipartError::Incomplete),
        }
    }
}

/// Inspects the bytes following a boundary.
///
/// Returns the length of the suffix and the state it leads to: `--` closes the body,
/// optional linear whitespace followed by CRLF opens the next part. `None` means more
/// data is needed.
fn boundary_suffix(src: &[u8]) -> Result<Option<(usize, State)>, MultipartError> {
    if src.len() < 2 {
        return Ok(None);
    }

    if src.starts_with(b"--") {
        return Ok(Some((2, State::Finished)));
    }

    let padding = src.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
    let rest = &src[padding..];
    if rest.len() < 2 {
        return Ok(None);
    }

    ensure!(rest.starts_with(b"\r\n"), MultipartError::invalid_boundary("boundary line not terminated by CRLF"));
    Ok(Some((padding + 2, State::Headers)))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
