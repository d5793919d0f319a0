use std::io;
use std::time::Duration;

use http::Version;
use thiserror::Error;

/// Coarse classification of every failure surfaced by this crate.
///
/// Callers that only need to decide "retry on a new connection", "report a
/// timeout" or "give up" can match on this instead of the detailed enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// resolve, connect, socket read/write or TLS handshake failure
    Connection,
    /// a single I/O operation exceeded its deadline, or was cancelled by closing the connection
    Timeout,
    /// malformed start line, header or body framing
    Protocol,
    /// the agent refused to continue, e.g. too many redirects
    Policy,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("can't resolve {authority}: {reason}")]
    Resolve { authority: String, reason: String },

    #[error("can't connect to {address}: {source}")]
    Connect { address: String, source: io::Error },

    #[error("tls handshake failed: {source}")]
    Handshake { source: io::Error },

    #[error("invalid tls configuration: {reason}")]
    Tls { reason: String },

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed while an operation was pending")]
    Cancelled,

    #[error("socket is not connected")]
    NotConnected,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl TransportError {
    pub fn resolve<S: ToString, R: ToString>(authority: S, reason: R) -> Self {
        Self::Resolve { authority: authority.to_string(), reason: reason.to_string() }
    }

    pub fn connect<S: ToString>(address: S, source: io::Error) -> Self {
        Self::Connect { address: address.to_string(), source }
    }

    pub fn tls<S: ToString>(reason: S) -> Self {
        Self::Tls { reason: reason.to_string() }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) | Self::Cancelled => FailureKind::Timeout,
            Self::NotConnected => FailureKind::Policy,
            _ => FailureKind::Connection,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid start line: {reason}")]
    InvalidStartLine { reason: String },

    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("unsupported transfer encoding: {encoding}")]
    UnsupportedTransferEncoding { encoding: String },

    #[error("message exceeds the expected input of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("stream closed before the message head was complete")]
    Incomplete,

    #[error("body truncated, expected {expected} bytes but received {received}")]
    TruncatedBody { expected: u64, received: u64 },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn invalid_start_line<S: ToString>(str: S) -> Self {
        Self::InvalidStartLine { reason: str.to_string() }
    }

    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn unsupported_transfer_encoding<S: ToString>(str: S) -> Self {
        Self::UnsupportedTransferEncoding { encoding: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport { source } => source.kind(),
            Self::Io { .. } => FailureKind::Connection,
            _ => FailureKind::Protocol,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source } if source.is_timeout())
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("unsupported http version: {0:?}")]
    UnsupportedVersion(Version),

    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_header<S: ToString>(name: S) -> Self {
        Self::InvalidHeader { name: name.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport { source } => source.kind(),
            Self::Io { .. } => FailureKind::Connection,
            _ => FailureKind::Protocol,
        }
    }
}

/// Failure of one accepted connection on the server side.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("handshake error: {source}")]
    HandshakeError { source: TransportError },

    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

impl HttpError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::HandshakeError { source } => source.kind(),
            Self::RequestError { source } => source.kind(),
            Self::ResponseError { source } => source.kind(),
        }
    }
}

/// The single terminal failure of a client exchange.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(ParseError),

    #[error(transparent)]
    Send(SendError),

    #[error("too many redirects, the limit is {max}")]
    TooManyRedirects { max: usize },

    #[error("client not connected")]
    NotConnected,

    #[error("invalid target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("invalid redirect location {location}: {reason}")]
    InvalidRedirect { location: String, reason: String },
}

impl ClientError {
    pub fn invalid_target<T: ToString, R: ToString>(target: T, reason: R) -> Self {
        Self::InvalidTarget { target: target.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_redirect<L: ToString, R: ToString>(location: L, reason: R) -> Self {
        Self::InvalidRedirect { location: location.to_string(), reason: reason.to_string() }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(e) => e.kind(),
            Self::Parse(e) => e.kind(),
            Self::Send(e) => e.kind(),
            Self::TooManyRedirects { .. } | Self::NotConnected | Self::InvalidTarget { .. } | Self::InvalidRedirect { .. } => {
                FailureKind::Policy
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == FailureKind::Timeout
    }
}

/// Transport failures that happened while parsing are reported as transport
/// failures, so a timeout stays a timeout for the caller.
impl From<ParseError> for ClientError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Transport { source } => Self::Transport(source),
            e => Self::Parse(e),
        }
    }
}

impl From<SendError> for ClientError {
    fn from(e: SendError) -> Self {
        match e {
            SendError::Transport { source } => Self::Transport(source),
            e => Self::Send(e),
        }
    }
}
