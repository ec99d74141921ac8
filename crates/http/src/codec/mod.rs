//! Decoders for streamed message bodies.
//!
//! Decoders follow the `tokio_util::codec::Decoder` contract, so they can be driven by a
//! `FramedRead` over any `AsyncRead`, or fed by hand from a `BytesMut`:
//!
//! - [`MultipartDecoder`]: splits a `multipart/form-data` body into
//!   [`PartHeader`](crate::protocol::PartHeader)s and part data

mod multipart_decoder;

pub use multipart_decoder::MultipartDecoder;
