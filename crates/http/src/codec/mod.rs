//! HTTP/1.x wire format.
//!
//! The codec is sans-IO at its core: decoders and encoders implement
//! `tokio_util::codec` traits over a `BytesMut` and know nothing about sockets.
//! [`Http1Parser`] and [`Http1Formatter`] bind them to a connection's
//! receive and send streams.
//!
//! # Architecture
//!
//! - Heads via the [`header`] module:
//!   - [`RequestHeadDecoder`] / [`ResponseHeadDecoder`] tokenize with `httparse`
//!     and decide the body framing
//!   - [`HeaderEncoder`] writes start lines and headers
//! - Bodies via the [`body`] module, framed by `Content-Length` or, for
//!   responses only, by the peer closing
//! - Whole messages: [`RequestDecoder`], [`ResponseDecoder`],
//!   [`RequestEncoder`], [`ResponseEncoder`]
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use duplex_http::codec::{RequestDecoder, ResponseEncoder};
//! use duplex_http::protocol::Response;
//! use http::StatusCode;
//! use tokio_util::codec::{Decoder, Encoder};
//!
//! let mut buf = BytesMut::from(&b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n"[..]);
//! let request = RequestDecoder::new().decode(&mut buf).unwrap().unwrap();
//! assert_eq!(request.uri.path(), "/index.html");
//!
//! let mut out = BytesMut::new();
//! ResponseEncoder::new().encode(&Response::new(StatusCode::NO_CONTENT), &mut out).unwrap();
//! assert_eq!(&out[..], b"HTTP/1.1 204 No Content\r\n\r\n");
//! ```
//!
//! # Limitations
//!
//! - `Transfer-Encoding` (chunked included) is rejected
//! - at most 64 headers and 8KB of head per message

pub mod body;
pub mod header;

mod formatter;
mod parser;
mod request_decoder;
mod request_encoder;
mod response_decoder;
mod response_encoder;

pub use formatter::Http1Formatter;
pub use header::{HeaderEncoder, RequestHeadDecoder, ResponseHeadDecoder};
pub use parser::Http1Parser;
pub use request_decoder::RequestDecoder;
pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;
pub use response_encoder::ResponseEncoder;
