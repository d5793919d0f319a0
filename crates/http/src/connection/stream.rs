//! Send and receive views over a [`Connection`].

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::connection::Connection;
use crate::protocol::{ParseError, TransportError};

/// Upper bound of a single socket read.
const READ_CHUNK: usize = 8 * 1024;

/// Outcome of one [`ReceiveStream::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// bytes appended to the input buffer
    Data(usize),
    /// the peer closed its side
    Eof,
    /// the expected input is already buffered, nothing more may be read
    Exhausted,
}

/// Batches formatter output and writes it with a single flush.
pub struct SendStream<'a> {
    connection: &'a mut Connection,
}

impl<'a> SendStream<'a> {
    pub(crate) fn new(connection: &'a mut Connection) -> Self {
        connection.output.clear();
        Self { connection }
    }

    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.connection.output
    }

    pub fn len(&self) -> usize {
        self.connection.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connection.output.is_empty()
    }

    /// Writes the whole buffer and flushes. Any failure closes the connection.
    pub async fn send(self) -> Result<(), TransportError> {
        let Connection { socket, output, timeout, cancel, .. } = &mut *self.connection;
        let Some(socket) = socket.as_mut().filter(|socket| socket.is_ready()) else {
            return Err(TransportError::NotConnected);
        };

        let result = timeout
            .run(cancel, async {
                socket.write_all(&output[..]).await?;
                socket.flush().await
            })
            .await;
        trace!(bytes = output.len(), ok = result.is_ok(), "sent");
        output.clear();

        if result.is_err() {
            self.connection.close();
        }
        result
    }
}

/// Pulls bytes from the socket on demand, never past the expected input.
pub struct ReceiveStream<'a> {
    connection: &'a mut Connection,
    timed_out: bool,
}

impl<'a> ReceiveStream<'a> {
    pub(crate) fn new(connection: &'a mut Connection) -> Self {
        Self { connection, timed_out: false }
    }

    /// Whether a read ran into its deadline.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn buffered(&self) -> &[u8] {
        &self.connection.input.data
    }

    /// Same as [`Connection::expect_input`], while the stream holds the connection.
    pub fn expect_input(&mut self, n: usize) {
        self.connection.input.expect(n);
    }

    pub fn expect_unbounded(&mut self) {
        self.connection.input.expect_unbounded();
    }

    /// Reads once from the socket into the input buffer.
    pub async fn fill(&mut self) -> Result<Fill, TransportError> {
        let Connection { socket, input, timeout, cancel, .. } = &mut *self.connection;
        let limit = match input.remaining {
            Some(0) => return Ok(Fill::Exhausted),
            Some(remaining) => remaining.min(READ_CHUNK),
            None => READ_CHUNK,
        };
        let Some(socket) = socket.as_mut().filter(|socket| socket.is_ready()) else {
            return Err(TransportError::NotConnected);
        };

        input.data.reserve(limit);
        let result = timeout.run(cancel, socket.read_buf(&mut (&mut input.data).limit(limit))).await;

        match result {
            Ok(0) => {
                trace!("peer closed");
                self.connection.peer_closed = true;
                Ok(Fill::Eof)
            }
            Ok(n) => {
                input.consumed(n);
                trace!(bytes = n, remaining = ?input.remaining, "received");
                Ok(Fill::Data(n))
            }
            Err(e) => {
                self.timed_out = e.is_timeout();
                self.connection.close();
                Err(e)
            }
        }
    }

    /// Feeds buffered and incoming bytes to `decoder` until it yields an item.
    ///
    /// On end of input the decoder's `decode_eof` decides, which returns
    /// `Ok(None)` when the stream ended cleanly before any message.
    pub async fn decode<D>(&mut self, decoder: &mut D) -> Result<Option<D::Item>, ParseError>
    where
        D: Decoder<Error = ParseError>,
    {
        loop {
            if let Some(item) = decoder.decode(&mut self.connection.input.data)? {
                return Ok(Some(item));
            }
            match self.fill().await? {
                Fill::Data(_) => continue,
                Fill::Eof => return decoder.decode_eof(&mut self.connection.input.data),
                Fill::Exhausted => {
                    let limit = self.connection.input.expected.unwrap_or_default();
                    return Err(ParseError::TooLarge { limit });
                }
            }
        }
    }
}
