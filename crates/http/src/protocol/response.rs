//! HTTP response representation.

use std::fmt::Write;

use http::{Method, StatusCode, Version};

use crate::connection::ConnectionInfo;
use crate::protocol::request::wants_close;
use crate::protocol::{Body, Headers, Request, Status, StatusType};

#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub version: Version,
    pub headers: Headers,
    pub body: Body,
    pub connection: Option<ConnectionInfo>,
}

impl Response {
    /// Creates an HTTP/1.1 response with the given status and no body.
    pub fn new<S: Into<Status>>(status: S) -> Self {
        Self::with_version(status, Version::HTTP_11)
    }

    pub fn with_version<S: Into<Status>>(status: S, version: Version) -> Self {
        Self { status: status.into(), version, headers: Headers::new(), body: Body::new(), connection: None }
    }

    /// A `text/plain` response whose body is the status reason phrase.
    pub fn simple<S: Into<Status>>(status: S, version: Version) -> Self {
        let mut response = Self::with_version(status, version);
        response.body.start_output(mime::TEXT_PLAIN_UTF_8);
        // writing into a Body never fails
        let _ = writeln!(response.body, "{}", response.status.reason());
        response
    }

    /// Whether the peer announced it will close the connection after this response.
    pub fn wants_close(&self) -> bool {
        wants_close(self.version, &self.headers)
    }

    /// Whether a response with this status to a request with this method must not carry a body.
    pub fn is_bodyless(status: &Status, method: &Method) -> bool {
        *method == Method::HEAD
            || status.status_type() == StatusType::Informational
            || status.code() == StatusCode::NO_CONTENT
            || status.code() == StatusCode::NOT_MODIFIED
    }

    /// Removes the body when HTTP mandates a bodyless response to `request`.
    pub fn clean_body(&mut self, request: &Request) {
        self.clean_body_for(&request.method);
    }

    /// Same as [`Response::clean_body`] when only the request method is known.
    pub fn clean_body_for(&mut self, method: &Method) {
        if Self::is_bodyless(&self.status, method) {
            self.body.stop_output();
            self.headers.set_or_insert("Content-Length", "0");
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}
