//! Start line and header block processing.
//!
//! - [`RequestHeadDecoder`] / [`ResponseHeadDecoder`]: parse a head and decide the body framing
//! - [`HeaderEncoder`]: write a start line and headers, keeping `Content-Length` consistent
//!   with the body

mod header_decoder;
mod header_encoder;

pub use header_decoder::RequestHeadDecoder;
pub use header_decoder::ResponseHeadDecoder;
pub(crate) use header_decoder::{MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use header_encoder::HeaderEncoder;
