use bytes::BytesMut;
use http::Method;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::ResponseHeadDecoder;
use crate::protocol::{Body, ParseError, Response};

/// Decoder for whole HTTP responses to a request with the given method.
///
/// A response without `Content-Length` is only complete once the stream ends,
/// so callers must feed it [`Decoder::decode_eof`] on end of input.
#[derive(Debug)]
pub struct ResponseDecoder {
    header_decoder: ResponseHeadDecoder,
    pending: Option<(Response, PayloadDecoder)>,
}

impl ResponseDecoder {
    pub fn new(request_method: &Method) -> Self {
        Self { header_decoder: ResponseHeadDecoder::new(request_method), pending: None }
    }

    fn decode_body(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<Response>, ParseError> {
        let Some((_, payload_decoder)) = &mut self.pending else {
            return Ok(None);
        };

        let decoded = if eof { payload_decoder.decode_eof(src)? } else { payload_decoder.decode(src)? };
        let Some(data) = decoded else {
            return Ok(None);
        };

        let Some((mut response, payload_decoder)) = self.pending.take() else {
            return Ok(None);
        };
        if !payload_decoder.is_empty() {
            response.body = Body::from_parsed(response.headers.get("Content-Type"), data);
        }
        Ok(Some(response))
    }
}

impl Decoder for ResponseDecoder {
    type Item = Response;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_none() {
            match self.header_decoder.decode(src)? {
                Some((response, payload_size)) => self.pending = Some((response, payload_size.into())),
                None => return Ok(None),
            }
        }
        self.decode_body(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_none() {
            match self.header_decoder.decode_eof(src)? {
                Some((response, payload_size)) => self.pending = Some((response, payload_size.into())),
                None => return Ok(None),
            }
        }
        self.decode_body(src, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn read_until_close() {
        let mut decoder = ResponseDecoder::new(&Method::GET);
        let mut buf = BytesMut::from(&b"HTTP/1.0 200 OK\r\nContent-Type: text/html\r\n\r\n<html>"[..]);

        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"</html>");
        let response = decoder.decode_eof(&mut buf).unwrap().unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.text(), "<html></html>");
        assert_eq!(response.body.content_type(), Some(&mime::TEXT_HTML));
    }

    #[test]
    fn head_response_has_no_body() {
        let mut decoder = ResponseDecoder::new(&Method::HEAD);
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 512\r\n\r\n"[..]);

        let response = decoder.decode(&mut buf).unwrap().unwrap();

        assert!(!response.body.has_data());
        assert_eq!(response.headers.get("Content-Length"), Some("512"));
    }

    #[test]
    fn closed_mid_head() {
        let mut decoder = ResponseDecoder::new(&Method::GET);
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Le"[..]);

        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert!(matches!(decoder.decode_eof(&mut buf), Err(ParseError::Incomplete)));
    }
}
