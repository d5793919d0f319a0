//! Message body with a content type.
//!
//! A [`Body`] is either inactive (the message carries no payload) or active:
//! a content type plus the bytes written so far. Bodies are always length
//! determinate, which is what the HTTP/1.x formatter relies on to compute
//! `Content-Length`.
//!
//! [`Body`] implements [`http_body::Body`], yielding its bytes as a single
//! data frame with an exact size hint.

use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http_body::{Body as HttpBody, Frame, SizeHint};
use mime::Mime;

#[derive(Debug, Clone, Default)]
pub struct Body {
    state: State,
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Inactive,
    Active {
        content_type: Mime,
        data: BytesMut,
    },
}

impl Body {
    /// An inactive body.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content<D: AsRef<[u8]>>(content_type: Mime, data: D) -> Self {
        Self { state: State::Active { content_type, data: BytesMut::from(data.as_ref()) } }
    }

    /// Builds the body of a parsed message, falling back to
    /// `application/octet-stream` when the declared type is missing or invalid.
    pub(crate) fn from_parsed(content_type: Option<&str>, data: Bytes) -> Self {
        let content_type =
            content_type.and_then(|value| value.parse::<Mime>().ok()).unwrap_or(mime::APPLICATION_OCTET_STREAM);
        Self { state: State::Active { content_type, data: BytesMut::from(data) } }
    }

    /// Activates the body with the given content type, discarding previous content.
    pub fn start_output(&mut self, content_type: Mime) {
        self.state = State::Active { content_type, data: BytesMut::new() };
    }

    /// Deactivates the body, dropping any content.
    pub fn stop_output(&mut self) {
        self.state = State::Inactive;
    }

    /// Appends raw bytes, activating the body as `application/octet-stream` if needed.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.active_data(mime::APPLICATION_OCTET_STREAM).extend_from_slice(bytes);
    }

    /// Appends text, activating the body as `text/plain; charset=utf-8` if needed.
    pub fn push_str(&mut self, s: &str) {
        self.active_data(mime::TEXT_PLAIN_UTF_8).extend_from_slice(s.as_bytes());
    }

    fn active_data(&mut self, default_type: Mime) -> &mut BytesMut {
        if let State::Inactive = self.state {
            self.start_output(default_type);
        }
        match &mut self.state {
            State::Active { data, .. } => data,
            State::Inactive => unreachable!("body activated above"),
        }
    }

    /// Whether the body is active.
    pub fn has_data(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    pub fn content_type(&self) -> Option<&Mime> {
        match &self.state {
            State::Active { content_type, .. } => Some(content_type),
            State::Inactive => None,
        }
    }

    /// Length of an active body, `None` when inactive.
    pub fn content_length(&self) -> Option<u64> {
        match &self.state {
            State::Active { data, .. } => Some(data.len() as u64),
            State::Inactive => None,
        }
    }

    /// Bytes of the body, empty when inactive.
    pub fn data(&self) -> &[u8] {
        match &self.state {
            State::Active { data, .. } => data,
            State::Inactive => &[],
        }
    }

    /// Takes the bytes out of the body, leaving it active but empty.
    pub fn take_data(&mut self) -> Bytes {
        match &mut self.state {
            State::Active { data, .. } => data.split().freeze(),
            State::Inactive => Bytes::new(),
        }
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.data()).into_owned()
    }
}

impl fmt::Write for Body {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match &mut this.state {
            State::Active { data, .. } if !data.is_empty() => Poll::Ready(Some(Ok(Frame::data(data.split().freeze())))),
            _ => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.data().is_empty()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.data().len() as u64)
    }
}
