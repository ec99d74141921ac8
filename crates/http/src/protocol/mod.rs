//! Core protocol types shared by the transfer, pipe and codec layers.
//!
//! - **Message Handling** ([`message`]): items produced by streaming decoders
//!   - [`Message`]: Represents either a header or a payload chunk
//!   - [`PayloadItem`]: Handles individual payload chunks and EOF
//!
//! - **Multipart Parts** ([`part`]): [`PartHeader`], the parsed header block of one part
//!
//! - **Error Handling** ([`error`]):
//!   - [`TransferError`]: copy, pipe and producer failures
//!   - [`MultipartError`]: multipart decoding failures
//!   - [`ProducerError`]: streamed request construction and completion failures

mod message;
pub use message::Message;
pub use message::PayloadItem;

mod part;
pub use part::PartHeader;

mod error;
pub use error::BoxError;
pub use error::MultipartError;
pub use error::ProducerError;
pub use error::TransferError;
