//! HTTP request representation.
//!
//! A [`Request`] is owned by whichever agent drives the exchange. The
//! connection it arrived on (or was sent over) is only referenced through a
//! [`ConnectionInfo`] snapshot, the request never keeps the connection alive.

use http::{Method, Uri, Version};

use crate::connection::ConnectionInfo;
use crate::protocol::{Body, Headers};

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: Headers,
    pub body: Body,
    pub connection: Option<ConnectionInfo>,
}

impl Request {
    /// Creates an HTTP/1.1 request without headers or body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self { method, uri, version: Version::HTTP_11, headers: Headers::new(), body: Body::new(), connection: None }
    }

    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: Uri) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Whether the peer asked for the connection to be closed after this exchange.
    pub fn wants_close(&self) -> bool {
        wants_close(self.version, &self.headers)
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::GET, Uri::from_static("/"))
    }
}

/// HTTP/1.0 closes unless told otherwise, HTTP/1.1 keeps alive unless told otherwise.
pub(crate) fn wants_close(version: Version, headers: &Headers) -> bool {
    if headers.has_token("Connection", "close") {
        return true;
    }
    version < Version::HTTP_11 && !headers.has_token("Connection", "keep-alive")
}

/// Methods defined by RFC 9110 plus PATCH; anything else is an extension method.
pub(crate) fn is_standard_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET
            | Method::HEAD
            | Method::POST
            | Method::PUT
            | Method::DELETE
            | Method::CONNECT
            | Method::OPTIONS
            | Method::TRACE
            | Method::PATCH
    )
}
