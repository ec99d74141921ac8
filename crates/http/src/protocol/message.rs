use bytes::{Buf, Bytes};

/// Represents an item produced by a streaming decoder that can either be a header or payload.
///
/// The generic parameter `T` is the header type (for multipart bodies a [`PartHeader`]),
/// while `Data` represents the type of the payload data (defaults to `Bytes`).
///
/// [`PartHeader`]: crate::protocol::PartHeader
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    /// Contains the header information of type `T`
    Header(T),
    /// Contains a chunk of payload data or the EOF marker of the current payload
    Payload(PayloadItem<Data>),
}

/// Represents an item in a payload stream.
///
/// Decoders produce either data chunks or signal the end of the payload (EOF).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Marks the end of the payload stream
    Eof,
}

impl PayloadItem {
    /// Returns a reference to the contained bytes if this is a Chunk
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
