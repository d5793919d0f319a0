//! Protocol types shared by both agents.
//!
//! - [`Request`] and [`Response`]: a start line, ordered [`Headers`] and a
//!   length-determinate [`Body`], plus a [`ConnectionInfo`](crate::connection::ConnectionInfo)
//!   snapshot of the connection the message travelled on
//! - [`Status`]: code, reason phrase and [`StatusType`] class
//! - [`PayloadSize`]: body framing decided by the head decoders
//! - error enums ([`TransportError`], [`ParseError`], [`SendError`],
//!   [`ClientError`], [`HttpError`]), each classified by [`FailureKind`]

mod message;
pub use message::PayloadSize;

mod status;
pub use status::Status;
pub use status::StatusType;

mod headers;
pub use headers::Header;
pub use headers::Headers;

mod body;
pub use body::Body;

pub(crate) mod request;
pub use request::Request;

mod response;
pub use response::Response;

mod error;
pub use error::ClientError;
pub use error::FailureKind;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::TransportError;
