//! Body decoding.
//!
//! - [`LengthDecoder`]: fixed-length payloads
//! - [`PayloadDecoder`]: picks the strategy from a [`PayloadSize`](crate::protocol::PayloadSize)
//!
//! Bodies are always written in one piece by the encoders, there is no body
//! encoder. Chunked transfer-coding is not supported in either direction.

mod length_decoder;
mod payload_decoder;

pub use length_decoder::LengthDecoder;
pub use payload_decoder::PayloadDecoder;
