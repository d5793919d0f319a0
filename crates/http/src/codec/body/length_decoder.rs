//! Decoder for bodies framed by `Content-Length`, see
//! [RFC 9112 Section 6.2](https://www.rfc-editor.org/rfc/rfc9112.html#name-content-length).

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::protocol::ParseError;

/// Waits until the whole declared length is buffered and yields it at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl Decoder for LengthDecoder {
    type Item = Bytes;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if (src.len() as u64) < self.length {
            return Ok(None);
        }
        Ok(Some(src.split_to(self.length as usize).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(bytes) => Ok(Some(bytes)),
            None => Err(ParseError::TruncatedBody { expected: self.length, received: src.len() as u64 }),
        }
    }
}
