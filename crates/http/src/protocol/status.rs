//! HTTP status with a reason phrase and its class.

use std::borrow::Cow;
use std::fmt;

use http::StatusCode;
use http::status::InvalidStatusCode;

/// The class a status code belongs to, derived from its hundreds digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusType {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

/// A status code plus the human readable reason phrase sent on the status line.
///
/// The reason defaults to the canonical phrase of the code but can be
/// replaced, parsed responses keep whatever the peer sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Status {
    code: StatusCode,
    reason: Cow<'static, str>,
}

impl Status {
    pub fn new(code: StatusCode) -> Self {
        Self { code, reason: Cow::Borrowed(code.canonical_reason().unwrap_or("Unknown")) }
    }

    pub fn with_reason<R: Into<Cow<'static, str>>>(code: StatusCode, reason: R) -> Self {
        Self { code, reason: reason.into() }
    }

    pub fn from_u16(code: u16) -> Result<Self, InvalidStatusCode> {
        StatusCode::from_u16(code).map(Self::new)
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn as_u16(&self) -> u16 {
        self.code.as_u16()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn status_type(&self) -> StatusType {
        match self.code.as_u16() {
            100..=199 => StatusType::Informational,
            200..=299 => StatusType::Success,
            300..=399 => StatusType::Redirection,
            400..=499 => StatusType::ClientError,
            _ => StatusType::ServerError,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status_type(), StatusType::ClientError | StatusType::ServerError)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl From<StatusCode> for Status {
    fn from(code: StatusCode) -> Self {
        Self::new(code)
    }
}

impl PartialEq<StatusCode> for Status {
    fn eq(&self, other: &StatusCode) -> bool {
        self.code == *other
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code.as_str(), self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_range() {
        assert_eq!(Status::from_u16(101).unwrap().status_type(), StatusType::Informational);
        assert_eq!(Status::from_u16(204).unwrap().status_type(), StatusType::Success);
        assert_eq!(Status::from_u16(308).unwrap().status_type(), StatusType::Redirection);
        assert_eq!(Status::from_u16(418).unwrap().status_type(), StatusType::ClientError);
        assert_eq!(Status::from_u16(503).unwrap().status_type(), StatusType::ServerError);
        assert_eq!(Status::from_u16(599).unwrap().status_type(), StatusType::ServerError);
    }

    #[test]
    fn error_statuses() {
        assert!(!Status::new(StatusCode::OK).is_error());
        assert!(!Status::new(StatusCode::FOUND).is_error());
        assert!(Status::new(StatusCode::NOT_FOUND).is_error());
        assert!(Status::new(StatusCode::BAD_GATEWAY).is_error());
    }

    #[test]
    fn reason_phrase() {
        let status = Status::new(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(status.reason(), "Method Not Allowed");
        assert_eq!(status.to_string(), "405 Method Not Allowed");

        let custom = Status::with_reason(StatusCode::OK, "Fine");
        assert_eq!(custom.to_string(), "200 Fine");
        assert_eq!(custom, StatusCode::OK);
    }
}
