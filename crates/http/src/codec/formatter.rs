use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::codec::header::HeaderEncoder;
use crate::codec::{RequestEncoder, ResponseEncoder};
use crate::connection::SendStream;
use crate::protocol::{Request, Response, SendError};

/// Serializes HTTP/1.x messages onto a [`SendStream`].
///
/// A whole message is formatted into the stream buffer first and written with
/// one flush, so a message that fails to format leaves nothing on the wire.
#[derive(Debug, Default, Clone, Copy)]
pub struct Http1Formatter {
    header_encoder: HeaderEncoder,
}

impl Http1Formatter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Uses `line_ending` instead of CRLF, for rendering messages as text only.
    pub fn with_line_ending(line_ending: &'static str) -> Self {
        Self { header_encoder: HeaderEncoder::with_line_ending(line_ending) }
    }

    pub fn format_request(&self, request: &Request, dst: &mut BytesMut) -> Result<(), SendError> {
        RequestEncoder::with_header_encoder(self.header_encoder).encode(request, dst)
    }

    pub fn format_response(&self, response: &Response, dst: &mut BytesMut) -> Result<(), SendError> {
        ResponseEncoder::with_header_encoder(self.header_encoder).encode(response, dst)
    }

    pub async fn request(&self, mut stream: SendStream<'_>, request: &Request) -> Result<(), SendError> {
        self.format_request(request, stream.buffer_mut())?;
        Ok(stream.send().await?)
    }

    pub async fn response(&self, mut stream: SendStream<'_>, response: &Response) -> Result<(), SendError> {
        self.format_response(response, stream.buffer_mut())?;
        Ok(stream.send().await?)
    }

    /// Renders `request` as text, invalid UTF-8 in the body is replaced.
    pub fn dump_request(request: &Request) -> String {
        let mut dst = BytesMut::new();
        match Self::with_line_ending("\n").format_request(request, &mut dst) {
            Ok(()) => String::from_utf8_lossy(&dst).into_owned(),
            Err(e) => format!("<unformattable request: {e}>"),
        }
    }

    pub fn dump_response(response: &Response) -> String {
        let mut dst = BytesMut::new();
        match Self::with_line_ending("\n").format_response(response, &mut dst) {
            Ok(()) => String::from_utf8_lossy(&dst).into_owned(),
            Err(e) => format!("<unformattable response: {e}>"),
        }
    }
}
