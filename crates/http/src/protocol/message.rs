/// How the body of a parsed message is framed on the wire.
///
/// Decided once the head is parsed, from `Content-Length`, the status code
/// and the request method (see [`crate::codec`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Body with known length in bytes, possibly zero
    Length(u64),
    /// The message carries no body
    Empty,
    /// Response body delimited by the peer closing the connection
    UntilClose,
}

impl PayloadSize {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    /// Declared length, `None` when the body is empty or close-delimited.
    #[inline]
    pub fn length(&self) -> Option<u64> {
        match self {
            PayloadSize::Length(n) => Some(*n),
            _ => None,
        }
    }
}
