//! Encoder for the start line and header block of HTTP/1.x messages.
//!
//! Headers are written in stored order. `Content-Length` always matches the
//! body that follows, and an active body's content type is declared when the
//! message does not declare one itself.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::{HeaderName, HeaderValue, Method, StatusCode, Version};
use mime::Mime;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::{Headers, PayloadSize, Request, Response, SendError, Status, StatusType};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

pub(crate) const CRLF: &str = "\r\n";

/// Serializes the head of a [`Request`] or [`Response`] given the framing of its body.
#[derive(Debug, Clone, Copy)]
pub struct HeaderEncoder {
    line_ending: &'static str,
}

impl HeaderEncoder {
    pub fn new() -> Self {
        Self { line_ending: CRLF }
    }

    /// Uses `line_ending` instead of CRLF, only meant for rendering messages as text.
    pub fn with_line_ending(line_ending: &'static str) -> Self {
        Self { line_ending }
    }
}

impl Default for HeaderEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<(&Request, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (&Request, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (request, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        let version = version_str(request.version)?;
        write!(FastWrite(dst), "{} {} {}{}", request.method, request_target(request), version, self.line_ending)?;

        // a request without a body carries no framing header
        let content_length = payload_size.length();
        let content_type = content_length.and(request.body.content_type());
        self.encode_headers(&request.headers, content_length, content_type, dst)
    }
}

impl Encoder<(&Response, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (&Response, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (response, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        let version = version_str(response.version)?;
        write!(
            FastWrite(dst),
            "{} {} {}{}",
            version,
            response.status.code().as_str(),
            response.status.reason(),
            self.line_ending
        )?;

        let content_length = match payload_size {
            PayloadSize::Length(n) => Some(n),
            _ if !may_declare_length(response.status.code()) => None,
            _ if response.headers.contains("Content-Length") => None,
            _ => Some(0),
        };
        let content_type = payload_size.length().and(response.body.content_type());
        self.encode_headers(&response.headers, content_length, content_type, dst)
    }
}

impl HeaderEncoder {
    /// Writes every header, with `Content-Length` set to `content_length` when given.
    fn encode_headers(
        &self,
        headers: &Headers,
        content_length: Option<u64>,
        content_type: Option<&Mime>,
        dst: &mut BytesMut,
    ) -> Result<(), SendError> {
        let mut length_written = false;
        for header in headers {
            if header.is("Content-Length")
                && let Some(length) = content_length
            {
                if !length_written {
                    self.put_header(&header.name, &length.to_string(), dst)?;
                    length_written = true;
                }
                continue;
            }
            self.put_header(&header.name, &header.value, dst)?;
        }

        if let Some(length) = content_length
            && !length_written
        {
            self.put_header("Content-Length", &length.to_string(), dst)?;
        }
        if let Some(content_type) = content_type
            && !headers.contains("Content-Type")
        {
            self.put_header("Content-Type", content_type.as_ref(), dst)?;
        }

        dst.put_slice(self.line_ending.as_bytes());
        Ok(())
    }

    fn put_header(&self, name: &str, value: &str, dst: &mut BytesMut) -> Result<(), SendError> {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| SendError::invalid_header(name))?;
        HeaderValue::from_str(value).map_err(|_| SendError::invalid_header(name))?;

        dst.put_slice(name.as_bytes());
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(self.line_ending.as_bytes());
        Ok(())
    }
}

fn version_str(version: Version) -> Result<&'static str, SendError> {
    match version {
        Version::HTTP_10 => Ok("HTTP/1.0"),
        Version::HTTP_11 => Ok("HTTP/1.1"),
        v => {
            error!(http_version = ?v, "unsupported http version");
            Err(SendError::UnsupportedVersion(v))
        }
    }
}

/// Origin-form for ordinary requests, authority-form for `CONNECT`.
fn request_target(request: &Request) -> &str {
    if request.method == Method::CONNECT
        && let Some(authority) = request.uri.authority()
    {
        return authority.as_str();
    }
    match request.uri.path_and_query() {
        Some(path_and_query) if !path_and_query.as_str().is_empty() => path_and_query.as_str(),
        _ => "/",
    }
}

/// 1xx and 204 responses must not carry `Content-Length`.
fn may_declare_length(code: StatusCode) -> bool {
    code != StatusCode::NO_CONTENT && Status::new(code).status_type() != StatusType::Informational
}

/// Fast writer implementation for writing to BytesMut.
///
/// This is an optimization to avoid unnecessary bounds checking when writing
/// to the bytes buffer, since we've already reserved enough space.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
