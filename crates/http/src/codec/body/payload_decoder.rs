//! Decoder for HTTP message bodies.
//!
//! Picks the strategy from the [`PayloadSize`] the head decoder settled on:
//! - Content-Length based payloads
//! - payloads delimited by the peer closing the connection
//! - no body

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadSize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Everything until end of stream
    UntilClose,

    /// Handle messages with no body
    NoBody,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn until_close() -> Self {
        Self { kind: Kind::UntilClose }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(size: PayloadSize) -> Self {
        match size {
            PayloadSize::Length(n) => PayloadDecoder::fix_length(n),
            PayloadSize::Empty => PayloadDecoder::empty(),
            PayloadSize::UntilClose => PayloadDecoder::until_close(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = Bytes;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::UntilClose => Ok(None),
            Kind::NoBody => Ok(Some(Bytes::new())),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode_eof(src),
            Kind::UntilClose => Ok(Some(src.split().freeze())),
            Kind::NoBody => Ok(Some(Bytes::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn until_close_takes_everything_at_eof() {
        let mut buffer = BytesMut::from(&b"partial"[..]);
        let mut decoder = PayloadDecoder::from(PayloadSize::UntilClose);

        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b" body");
        assert_eq!(&decoder.decode_eof(&mut buffer).unwrap().unwrap()[..], b"partial body");
        assert!(buffer.is_empty());
    }

    #[test]
    fn no_body_leaves_buffer() {
        let mut buffer = BytesMut::from(&b"next"[..]);
        let mut decoder = PayloadDecoder::from(PayloadSize::Empty);

        assert!(decoder.is_empty());
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_empty());
        assert_eq!(&buffer[..], b"next");
    }
}
