//! Reads HTTP/1.x messages from a [`ReceiveStream`].
//!
//! The parser owns no buffer: bytes stay in the connection's input buffer and
//! are handed to the head and payload decoders as they arrive. How much may be
//! read is the caller's business, through
//! [`ReceiveStream::expect_input`] before each phase.

use http::Method;
use tracing::trace;

use crate::codec::ResponseDecoder;
use crate::codec::body::PayloadDecoder;
use crate::codec::header::RequestHeadDecoder;
use crate::connection::ReceiveStream;
use crate::protocol::{Body, ParseError, PayloadSize, Request, Response};

#[derive(Debug, Default, Clone, Copy)]
pub struct Http1Parser;

impl Http1Parser {
    pub fn new() -> Self {
        Self
    }

    /// Parses a request line and header block.
    ///
    /// Returns `Ok(None)` when the peer closed before sending anything.
    pub async fn request_head(
        &self,
        stream: &mut ReceiveStream<'_>,
    ) -> Result<Option<(Request, PayloadSize)>, ParseError> {
        stream.decode(&mut RequestHeadDecoder).await
    }

    /// Reads the body announced by `payload_size` into `request.body`.
    ///
    /// The expectation must already cover the body.
    pub async fn body(
        &self,
        stream: &mut ReceiveStream<'_>,
        request: &mut Request,
        payload_size: PayloadSize,
    ) -> Result<(), ParseError> {
        let mut decoder = PayloadDecoder::from(payload_size);
        if decoder.is_empty() {
            return Ok(());
        }

        let data = stream.decode(&mut decoder).await?.ok_or(ParseError::Incomplete)?;
        trace!(body_size = data.len(), "parsed request body");
        request.body = Body::from_parsed(request.headers.get("Content-Type"), data);
        Ok(())
    }

    /// Parses a whole request, head and body, under one expectation.
    pub async fn request(&self, stream: &mut ReceiveStream<'_>) -> Result<Option<Request>, ParseError> {
        let Some((mut request, payload_size)) = self.request_head(stream).await? else {
            return Ok(None);
        };
        self.body(stream, &mut request, payload_size).await?;
        Ok(Some(request))
    }

    /// Parses the response to a request sent with `request_method`.
    ///
    /// A stream ending before a complete response is [`ParseError::Incomplete`].
    pub async fn response(&self, stream: &mut ReceiveStream<'_>, request_method: &Method) -> Result<Response, ParseError> {
        let response = stream.decode(&mut ResponseDecoder::new(request_method)).await?.ok_or(ParseError::Incomplete)?;
        trace!(status = response.status.as_u16(), body_size = response.body.data().len(), "parsed response");
        Ok(response)
    }
}
