//! Decoders for the start line and header block of HTTP/1.x messages.
//!
//! Both decoders tokenize with `httparse` and only consume the head bytes, so
//! whatever follows the blank line stays in the buffer for the payload
//! decoder. Once the head is complete the framing of the body is decided and
//! returned as a [`PayloadSize`].
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum head size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1

use bytes::BytesMut;
use http::{Method, StatusCode, Uri, Version};
use httparse::{EMPTY_HEADER, Error, Status as ParseStatus};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{Headers, ParseError, PayloadSize, Request, Response, Status};

/// Maximum number of headers allowed in a message
pub(crate) const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the start line plus the header section
pub(crate) const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes a request line and headers into a [`Request`] with an inactive body.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestHeadDecoder;

impl Decoder for RequestHeadDecoder {
    type Item = (Request, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut headers = [EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let body_offset = match req.parse(src).map_err(map_httparse_error)? {
            ParseStatus::Complete(body_offset) => body_offset,
            ParseStatus::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        trace!(head_size = body_offset, "parsed request head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let method = req.method.ok_or(ParseError::InvalidMethod)?;
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
        let uri = req.path.ok_or(ParseError::InvalidUri)?;
        let uri = uri.parse::<Uri>().map_err(|_| ParseError::InvalidUri)?;
        let version = parse_version(req.version)?;
        let headers = collect_headers(req.headers)?;

        let mut request = Request::new(method, uri);
        request.version = version;
        request.headers = headers;

        let payload_size = request_payload(&request.headers)?;
        let _ = src.split_to(body_offset);
        Ok(Some((request, payload_size)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_head_eof(self, buf)
    }
}

/// Decodes a status line and headers into a [`Response`] with an inactive body.
///
/// The method of the request being answered decides whether a body follows,
/// a response to `HEAD` never has one whatever its headers say.
#[derive(Debug, Clone)]
pub struct ResponseHeadDecoder {
    request_method: Method,
}

impl ResponseHeadDecoder {
    pub fn new(request_method: &Method) -> Self {
        Self { request_method: request_method.clone() }
    }
}

impl Decoder for ResponseHeadDecoder {
    type Item = (Response, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut headers = [EMPTY_HEADER; MAX_HEADER_NUM];
        let mut res = httparse::Response::new(&mut headers);

        let body_offset = match res.parse(src).map_err(map_httparse_error)? {
            ParseStatus::Complete(body_offset) => body_offset,
            ParseStatus::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        trace!(head_size = body_offset, "parsed response head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = parse_version(res.version)?;
        let code = res.code.ok_or_else(|| ParseError::invalid_start_line("missing status code"))?;
        let code = StatusCode::from_u16(code).map_err(ParseError::invalid_start_line)?;
        let status = match res.reason {
            Some(reason) if !reason.is_empty() => Status::with_reason(code, reason.to_owned()),
            _ => Status::new(code),
        };
        let headers = collect_headers(res.headers)?;

        let mut response = Response::with_version(status, version);
        response.headers = headers;

        let payload_size = response_payload(&response, &self.request_method)?;
        let _ = src.split_to(body_offset);
        Ok(Some((response, payload_size)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_head_eof(self, buf)
    }
}

/// A stream ending before any byte is a clean close; ending inside a head is an error.
fn decode_head_eof<D>(decoder: &mut D, buf: &mut BytesMut) -> Result<Option<D::Item>, ParseError>
where
    D: Decoder<Error = ParseError>,
{
    if buf.is_empty() {
        return Ok(None);
    }
    match decoder.decode(buf)? {
        Some(item) => Ok(Some(item)),
        None => Err(ParseError::Incomplete),
    }
}

fn map_httparse_error(e: Error) -> ParseError {
    match e {
        Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        Error::HeaderName | Error::HeaderValue => ParseError::invalid_header(e),
        Error::Version => ParseError::InvalidVersion(None),
        e => ParseError::invalid_start_line(e),
    }
}

fn parse_version(version: Option<u8>) -> Result<Version, ParseError> {
    match version {
        Some(0) => Ok(Version::HTTP_10),
        Some(1) => Ok(Version::HTTP_11),
        v => Err(ParseError::InvalidVersion(v)),
    }
}

fn collect_headers(parsed: &[httparse::Header<'_>]) -> Result<Headers, ParseError> {
    let mut headers = Headers::with_capacity(parsed.len());
    for header in parsed {
        let value = std::str::from_utf8(header.value)
            .map_err(|_| ParseError::invalid_header(format!("value of {} is not utf-8", header.name)))?;
        headers.append(header.name, value.trim());
    }
    Ok(headers)
}

/// Body framing of a request: only `Content-Length` is understood.
pub(crate) fn request_payload(headers: &Headers) -> Result<PayloadSize, ParseError> {
    match content_length(headers)? {
        Some(length) => Ok(PayloadSize::Length(length)),
        None => Ok(PayloadSize::Empty),
    }
}

/// Body framing of a response, refer: <https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length>
pub(crate) fn response_payload(response: &Response, request_method: &Method) -> Result<PayloadSize, ParseError> {
    if Response::is_bodyless(&response.status, request_method) {
        return Ok(PayloadSize::Empty);
    }
    match content_length(&response.headers)? {
        Some(length) => Ok(PayloadSize::Length(length)),
        None => Ok(PayloadSize::UntilClose),
    }
}

/// The declared `Content-Length`, rejecting any transfer coding and
/// conflicting duplicates.
fn content_length(headers: &Headers) -> Result<Option<u64>, ParseError> {
    let te_header = headers.get("Transfer-Encoding");
    let has_cl = headers.contains("Content-Length");

    match (te_header, has_cl) {
        (Some(_), true) => {
            Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers"))
        }
        (Some(encoding), false) => Err(ParseError::unsupported_transfer_encoding(encoding)),
        (None, false) => Ok(None),
        (None, true) => {
            let mut length = None;
            for value in headers.get_all("Content-Length") {
                let parsed = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ParseError::invalid_content_length(format!("value {value} is not u64")))?;
                match length {
                    Some(previous) if previous != parsed => {
                        return Err(ParseError::invalid_content_length(format!("conflicting values {previous} and {parsed}")));
                    }
                    _ => length = Some(parsed),
                }
            }
            Ok(length)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn crlf(s: &str) -> BytesMut {
        BytesMut::from(s.replace('\n', "\r\n").as_str())
    }

    #[test]
    fn test_bytes_mut_lens() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        123"##};

        let mut bytes = BytesMut::from(str);

        let result = RequestHeadDecoder.decode(&mut bytes).unwrap();

        assert!(result.is_some());

        assert_eq!(bytes.len(), 3);
        assert_eq!(&bytes[..], &b"123"[..]);
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);

        let (request, payload_size) = RequestHeadDecoder.decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert!(!request.body.has_data());

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.version, Version::HTTP_11);
        assert_eq!(request.uri.host(), None);
        assert_eq!(request.uri.path(), "/index.html");
        assert_eq!(request.uri.query(), None);

        assert_eq!(request.headers.len(), 3);
        assert_eq!(request.headers.get("accept"), Some("*/*"));
        assert_eq!(request.headers.get("Host"), Some("127.0.0.1:8080"));
        assert_eq!(request.headers.get("User-Agent"), Some("curl/7.79.1"));
    }

    #[test]
    fn from_edge() {
        let str = indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Connection: keep-alive
        Cache-Control: max-age=0
        sec-ch-ua: "#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109"
        sec-ch-ua-mobile: ?0
        sec-ch-ua-platform: "macOS"
        Upgrade-Insecure-Requests: 1
        User-Agent: Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36 Edg/109.0.1518.52
        Accept: text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9
        Sec-Fetch-Site: none
        Sec-Fetch-Mode: navigate
        Sec-Fetch-User: ?1
        Sec-Fetch-Dest: document
        Accept-Encoding: gzip, deflate, br
        Accept-Language: zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7

        "##};

        let mut buf = BytesMut::from(str);

        let (request, payload_size) = RequestHeadDecoder.decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());

        assert_eq!(request.uri.path(), "/index/");
        assert_eq!(request.uri.query(), Some("a=1&b=2&a=3"));

        assert_eq!(request.headers.len(), 15);

        let names: Vec<_> = request.headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names[..4], ["Host", "Connection", "Cache-Control", "sec-ch-ua"]);
        assert_eq!(names[14], "Accept-Language");

        assert_eq!(
            request.headers.get("sec-ch-ua"),
            Some(r##""#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109""##)
        );
        assert_eq!(request.headers.get("sec-ch-ua-platform"), Some("\"macOS\""));
        assert_eq!(request.headers.get("Accept-Encoding"), Some("gzip, deflate, br"));
        assert_eq!(request.headers.get("Accept-Language"), Some("zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7"));
    }

    #[test]
    fn partial_head_needs_more() {
        let mut buf = crlf("GET / HTTP/1.1\nHost: local");

        assert!(RequestHeadDecoder.decode(&mut buf).unwrap().is_none());
        assert!(matches!(RequestHeadDecoder.decode_eof(&mut buf), Err(ParseError::Incomplete)));

        let mut empty = BytesMut::new();
        assert!(RequestHeadDecoder.decode_eof(&mut empty).unwrap().is_none());
    }

    #[test]
    fn header_without_colon() {
        let mut buf = crlf("GET / HTTP/1.1\nHost: localhost\nBrokenHeader\n\n");

        assert!(matches!(RequestHeadDecoder.decode(&mut buf), Err(ParseError::InvalidHeader { .. })));
    }

    #[test]
    fn malformed_start_line() {
        let mut buf = crlf("GET\n\n");
        assert!(RequestHeadDecoder.decode(&mut buf).is_err());

        let mut buf = crlf("GET / HTTP/2.0\n\n");
        assert!(matches!(RequestHeadDecoder.decode(&mut buf), Err(ParseError::InvalidVersion(_))));
    }

    #[test]
    fn extension_method_is_parsed() {
        let mut buf = crlf("BREW /pot HTTP/1.1\nContent-Length: 5\n\ncoffe");

        let (request, payload_size) = RequestHeadDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(request.method.as_str(), "BREW");
        assert_eq!(payload_size, PayloadSize::Length(5));
        assert_eq!(&buf[..], b"coffe");
    }

    #[test]
    fn too_large_head() {
        let mut head = String::from("GET / HTTP/1.1\r\n");
        head.push_str(&format!("X-Big: {}\r\n", "a".repeat(MAX_HEADER_BYTES)));
        let mut buf = BytesMut::from(head.as_str());

        assert!(matches!(RequestHeadDecoder.decode(&mut buf), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn too_many_headers() {
        let mut head = String::from("GET / HTTP/1.1\r\n");
        for i in 0..=MAX_HEADER_NUM {
            head.push_str(&format!("X-{i}: {i}\r\n"));
        }
        head.push_str("\r\n");
        let mut buf = BytesMut::from(head.as_str());

        assert!(matches!(RequestHeadDecoder.decode(&mut buf), Err(ParseError::TooManyHeaders { .. })));
    }

    #[test]
    fn content_length_rules() {
        let mut buf = crlf("POST / HTTP/1.1\nContent-Length: 3\nContent-Length: 3\n\nabc");
        let (_, payload_size) = RequestHeadDecoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Length(3));

        let mut buf = crlf("POST / HTTP/1.1\nContent-Length: 3\nContent-Length: 4\n\nabc");
        assert!(matches!(RequestHeadDecoder.decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));

        let mut buf = crlf("POST / HTTP/1.1\nContent-Length: abc\n\n");
        assert!(matches!(RequestHeadDecoder.decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));

        let mut buf = crlf("POST / HTTP/1.1\nTransfer-Encoding: chunked\nContent-Length: 3\n\n");
        assert!(matches!(RequestHeadDecoder.decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn chunked_is_unsupported() {
        let mut buf = crlf("POST / HTTP/1.1\nTransfer-Encoding: gzip, chunked\n\n");

        match RequestHeadDecoder.decode(&mut buf) {
            Err(ParseError::UnsupportedTransferEncoding { encoding }) => assert_eq!(encoding, "gzip, chunked"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn response_head() {
        let mut buf = crlf("HTTP/1.0 302 Moved Elsewhere\nLocation: /next\nContent-Length: 2\n\nok");

        let (response, payload_size) = ResponseHeadDecoder::new(&Method::GET).decode(&mut buf).unwrap().unwrap();

        assert_eq!(response.version, Version::HTTP_10);
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.status.reason(), "Moved Elsewhere");
        assert_eq!(response.headers.get("location"), Some("/next"));
        assert_eq!(payload_size, PayloadSize::Length(2));
        assert_eq!(&buf[..], b"ok");
    }

    #[test]
    fn response_framing() {
        let mut buf = crlf("HTTP/1.1 200 OK\n\n");
        let (_, size) = ResponseHeadDecoder::new(&Method::GET).decode(&mut buf).unwrap().unwrap();
        assert_eq!(size, PayloadSize::UntilClose);

        let mut buf = crlf("HTTP/1.1 200 OK\nContent-Length: 10\n\n");
        let (_, size) = ResponseHeadDecoder::new(&Method::HEAD).decode(&mut buf).unwrap().unwrap();
        assert_eq!(size, PayloadSize::Empty);

        for code in ["100", "204", "304"] {
            let mut buf = crlf(&format!("HTTP/1.1 {code} X\nContent-Length: 10\n\n"));
            let (_, size) = ResponseHeadDecoder::new(&Method::GET).decode(&mut buf).unwrap().unwrap();
            assert_eq!(size, PayloadSize::Empty, "status {code}");
        }
    }

    #[test]
    fn empty_reason_uses_canonical() {
        let mut buf = crlf("HTTP/1.1 404 \n\n");

        let (response, _) = ResponseHeadDecoder::new(&Method::GET).decode(&mut buf).unwrap().unwrap();

        assert_eq!(response.status.reason(), "Not Found");
    }
}
