//! Decoder for whole HTTP requests.
//!
//! Works in two phases, like the server does over a connection:
//! 1. Header parsing with [`RequestHeadDecoder`]
//! 2. Body parsing with a [`PayloadDecoder`] chosen from the head
//!
//! The server drives the two phases itself so it can check the declared
//! length before reading the body. This decoder is for callers that already
//! trust the input, and for tests.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::RequestHeadDecoder;
use crate::protocol::{Body, ParseError, Request};

/// The decoder keeps its state in `pending`:
/// - `None`: currently parsing the head
/// - `Some(..)`: head parsed, waiting for the body
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: RequestHeadDecoder,
    pending: Option<(Request, PayloadDecoder)>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Request;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_none() {
            match self.header_decoder.decode(src)? {
                Some((request, payload_size)) => self.pending = Some((request, payload_size.into())),
                None => return Ok(None),
            }
        }
        self.decode_body(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_none() {
            match self.header_decoder.decode_eof(src)? {
                Some((request, payload_size)) => self.pending = Some((request, payload_size.into())),
                None => return Ok(None),
            }
        }
        self.decode_body(src, true)
    }
}

impl RequestDecoder {
    fn decode_body(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<Request>, ParseError> {
        let Some((_, payload_decoder)) = &mut self.pending else {
            return Ok(None);
        };

        let decoded = if eof { payload_decoder.decode_eof(src)? } else { payload_decoder.decode(src)? };
        let Some(data) = decoded else {
            return Ok(None);
        };

        let Some((mut request, payload_decoder)) = self.pending.take() else {
            return Ok(None);
        };
        if !payload_decoder.is_empty() {
            request.body = Body::from_parsed(request.headers.get("Content-Type"), data);
        }
        Ok(Some(request))
    }
}
