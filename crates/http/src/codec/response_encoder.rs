use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::codec::header::HeaderEncoder;
use crate::protocol::{PayloadSize, Response, SendError};

/// Writes a whole [`Response`]: head, then the body bytes when the body is active.
///
/// The response is written as is, callers apply
/// [`Response::clean_body`](crate::protocol::Response::clean_body) first when
/// the request it answers is known.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_header_encoder(header_encoder: HeaderEncoder) -> Self {
        Self { header_encoder }
    }
}

impl Encoder<&Response> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, response: &Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload_size = match response.body.content_length() {
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Empty,
        };

        self.header_encoder.encode((response, payload_size), dst)?;
        dst.extend_from_slice(response.body.data());
        Ok(())
    }
}
