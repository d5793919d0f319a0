use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::codec::header::HeaderEncoder;
use crate::protocol::{PayloadSize, Request, SendError};

/// Writes a whole [`Request`]: head, then the body bytes when the body is active.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestEncoder {
    header_encoder: HeaderEncoder,
}

impl RequestEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_header_encoder(header_encoder: HeaderEncoder) -> Self {
        Self { header_encoder }
    }
}

impl Encoder<&Request> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, request: &Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload_size = match request.body.content_length() {
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Empty,
        };

        self.header_encoder.encode((request, payload_size), dst)?;
        dst.extend_from_slice(request.body.data());
        Ok(())
    }
}
