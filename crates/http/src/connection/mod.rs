//! Buffered I/O over one transport socket.
//!
//! A [`Connection`] owns a [`TransportSocket`] (until it is closed), an
//! [`InputBuffer`] that tracks how many more bytes may be read for the current
//! message, and an output buffer. The codec never touches the socket: it sees
//! the input through a [`ReceiveStream`] and writes into a [`SendStream`].
//!
//! # Lifecycle
//!
//! - any transport failure (including a timeout) closes the connection, it
//!   has to be re-established rather than retried
//! - [`Connection::close`] is idempotent and cancels whatever I/O is pending
//! - a [`ConnectionCloser`] does the same from another task

mod info;
mod stream;

pub use info::{Authority, ConnectionInfo};
pub use stream::{Fill, ReceiveStream, SendStream};

use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::protocol::TransportError;
use crate::transport::{Timeout, TransportSocket};

/// Bytes received but not yet decoded, plus the input still expected.
#[derive(Debug, Default)]
pub struct InputBuffer {
    data: BytesMut,
    /// bytes that may still be read from the socket, `None` when unbounded
    remaining: Option<usize>,
    /// the last declared expectation
    expected: Option<usize>,
}

impl InputBuffer {
    /// Expects `n` bytes in total, counting those already buffered.
    pub fn expect(&mut self, n: usize) {
        self.remaining = Some(n.saturating_sub(self.data.len()));
        self.expected = Some(n);
    }

    pub fn expect_unbounded(&mut self) {
        self.remaining = None;
        self.expected = None;
    }

    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }

    /// Whether everything expected has been received.
    pub fn is_satisfied(&self) -> bool {
        self.remaining == Some(0)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn consumed(&mut self, n: usize) {
        if let Some(remaining) = &mut self.remaining {
            *remaining = remaining.saturating_sub(n);
        }
    }
}

#[derive(Debug)]
pub struct Connection {
    socket: Option<TransportSocket>,
    input: InputBuffer,
    output: BytesMut,
    timeout: Timeout,
    cancel: CancellationToken,
    peer_closed: bool,
    authority: Option<Authority>,
    encrypted: bool,
    peer_verified: bool,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl Connection {
    pub fn new(socket: TransportSocket, timeout: Timeout) -> Self {
        Self {
            encrypted: socket.is_encrypted(),
            peer_verified: false,
            local_addr: socket.local_addr(),
            peer_addr: socket.peer_addr(),
            socket: Some(socket),
            input: InputBuffer::default(),
            output: BytesMut::new(),
            timeout,
            cancel: CancellationToken::new(),
            peer_closed: false,
            authority: None,
        }
    }

    /// Opens a client connection to `authority`, encrypted when it is `https`.
    ///
    /// The TLS handshake is not performed yet, see [`Connection::handshake`].
    pub async fn open(
        authority: Authority,
        tls: Option<std::sync::Arc<crate::transport::ClientTlsContext>>,
        timeout: Timeout,
    ) -> Result<Self, TransportError> {
        let socket = match (authority.secure, tls) {
            (true, Some(context)) => {
                TransportSocket::connect_encrypted(&authority.host, authority.port, context, timeout).await?
            }
            (true, None) => return Err(TransportError::tls("no tls context for an https target")),
            (false, _) => TransportSocket::connect(&authority.host, authority.port, timeout).await?,
        };
        let mut connection = Self::new(socket, timeout);
        connection.authority = Some(authority);
        Ok(connection)
    }

    /// Runs the transport handshake, a no-op for plain sockets.
    ///
    /// A failed handshake closes the connection.
    pub async fn handshake(&mut self) -> Result<(), TransportError> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        match self.timeout.run(&self.cancel, socket.handshake()).await {
            Ok(()) => {
                self.peer_verified = socket.peer_verified();
                Ok(())
            }
            Err(e) => {
                debug!(cause = %e, "handshake failed");
                self.close();
                Err(e)
            }
        }
    }

    /// Whether the connection may still be used, without performing I/O.
    ///
    /// Turns false once a read saw the peer close its side.
    pub fn connected(&self) -> bool {
        self.writable() && !self.peer_closed
    }

    /// Whether a message can still be sent, the peer may have stopped sending.
    pub(crate) fn writable(&self) -> bool {
        self.socket.is_some() && !self.cancel.is_cancelled()
    }

    /// Cancels pending operations and drops the socket. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.cancel.cancel();
        if self.socket.take().is_some() {
            trace!(peer_addr = ?self.peer_addr, "connection closed");
        }
    }

    /// Shuts the write side down gracefully (TLS `close_notify` included), then closes.
    pub async fn shutdown(&mut self) {
        if let Some(socket) = self.socket.as_mut()
            && !self.cancel.is_cancelled()
            && let Err(e) = self.timeout.run(&self.cancel, socket.shutdown()).await
        {
            trace!(cause = %e, "shutdown failed");
        }
        self.close();
    }

    /// Expects `n` more bytes for the current message, counting bytes already buffered.
    pub fn expect_input(&mut self, n: usize) {
        self.input.expect(n);
    }

    /// Lifts the expectation, used while reading a message head.
    pub fn expect_unbounded(&mut self) {
        self.input.expect_unbounded();
    }

    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    pub fn send_stream(&mut self) -> SendStream<'_> {
        SendStream::new(self)
    }

    pub fn receive_stream(&mut self) -> ReceiveStream<'_> {
        ReceiveStream::new(self)
    }

    pub fn closer(&self) -> ConnectionCloser {
        ConnectionCloser { cancel: self.cancel.clone() }
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            local_addr: self.local_addr,
            peer_addr: self.peer_addr,
            encrypted: self.encrypted,
            peer_verified: self.peer_verified,
        }
    }

    /// The remote authority of a client connection, `None` for accepted ones.
    pub fn authority(&self) -> Option<&Authority> {
        self.authority.as_ref()
    }

    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Timeout) {
        self.timeout = timeout;
    }
}

/// Closes a [`Connection`] from elsewhere; its pending I/O fails with
/// [`TransportError::Cancelled`].
#[derive(Debug, Clone)]
pub struct ConnectionCloser {
    cancel: CancellationToken,
}

impl ConnectionCloser {
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
