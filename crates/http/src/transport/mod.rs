//! Byte transport underneath a [`Connection`].
//!
//! [`TransportSocket`] is a closed set of socket kinds: a plain TCP stream or
//! a TLS stream over TCP. Both read and write through `AsyncRead` /
//! `AsyncWrite`, the encrypted one only after its handshake.
//!
//! Every blocking step (connect, handshake, each read and each write) is
//! bounded by a [`Timeout`] and can be cancelled through the connection's
//! cancellation token.

mod tls;

pub use tls::{
    ClientTlsConfig, ClientTlsContext, ServerTlsConfig, ServerTlsContext, TlsSocket, VerifyMode, load_certs,
    load_private_key,
};

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream, lookup_host};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::connection::Connection;
use crate::protocol::TransportError;

/// Deadline applied to each single I/O operation, `None` waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeout(Option<Duration>);

impl Timeout {
    pub const NONE: Timeout = Timeout(None);

    pub fn new(duration: Duration) -> Self {
        Self(Some(duration))
    }

    pub fn duration(&self) -> Option<Duration> {
        self.0
    }

    /// Runs `fut` under the deadline.
    pub(crate) async fn limit<T, E, F>(self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<TransportError>,
    {
        match self.0 {
            Some(duration) => match tokio::time::timeout(duration, fut).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(TransportError::Timeout(duration)),
            },
            None => fut.await.map_err(Into::into),
        }
    }

    /// Runs `fut` under the deadline, giving up as soon as `cancel` fires.
    pub(crate) async fn run<T, E, F>(self, cancel: &CancellationToken, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<TransportError>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.limit(fut) => result,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::new(duration)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(duration: Option<Duration>) -> Self {
        Self(duration)
    }
}

#[derive(Debug)]
pub enum TransportSocket {
    Plain(TcpStream),
    Encrypted(TlsSocket),
}

impl TransportSocket {
    /// Opens a plain socket to the first reachable address of `host:port`.
    pub async fn connect(host: &str, port: u16, timeout: Timeout) -> Result<Self, TransportError> {
        Ok(Self::Plain(connect_tcp(host, port, timeout).await?))
    }

    /// Opens a socket that must complete a client handshake before use.
    pub async fn connect_encrypted(
        host: &str,
        port: u16,
        context: Arc<ClientTlsContext>,
        timeout: Timeout,
    ) -> Result<Self, TransportError> {
        let server_name = ServerName::try_from(host.trim_matches(['[', ']']).to_owned()).map_err(TransportError::tls)?;
        let tcp = connect_tcp(host, port, timeout).await?;
        Ok(Self::Encrypted(TlsSocket::client(tcp, context, server_name)))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }

    /// Whether reads and writes can proceed, i.e. any handshake is done.
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Plain(_) => true,
            Self::Encrypted(tls) => tls.is_ready(),
        }
    }

    pub fn peer_verified(&self) -> bool {
        match self {
            Self::Plain(_) => false,
            Self::Encrypted(tls) => tls.peer_verified(),
        }
    }

    /// No-op for plain sockets.
    pub async fn handshake(&mut self) -> Result<(), TransportError> {
        match self {
            Self::Plain(_) => Ok(()),
            Self::Encrypted(tls) => tls.handshake().await,
        }
    }

    fn tcp(&self) -> Option<&TcpStream> {
        match self {
            Self::Plain(tcp) => Some(tcp),
            Self::Encrypted(tls) => tls.tcp(),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.tcp().and_then(|tcp| tcp.local_addr().ok())
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.tcp().and_then(|tcp| tcp.peer_addr().ok())
    }
}

impl AsyncRead for TransportSocket {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_read(cx, buf),
            Self::Encrypted(tls) => Pin::new(tls).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TransportSocket {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_write(cx, buf),
            Self::Encrypted(tls) => Pin::new(tls).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_flush(cx),
            Self::Encrypted(tls) => Pin::new(tls).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_shutdown(cx),
            Self::Encrypted(tls) => Pin::new(tls).poll_shutdown(cx),
        }
    }
}

async fn connect_tcp(host: &str, port: u16, timeout: Timeout) -> Result<TcpStream, TransportError> {
    let authority = format!("{host}:{port}");
    let addresses: Vec<SocketAddr> = timeout
        .limit(async {
            lookup_host(authority.as_str())
                .await
                .map(|addresses| addresses.collect())
                .map_err(|e| TransportError::resolve(&authority, e))
        })
        .await?;

    let mut last_error = None;
    for address in addresses {
        match timeout.limit(TcpStream::connect(address)).await {
            Ok(tcp) => {
                debug!(%address, "connected");
                if let Err(e) = tcp.set_nodelay(true) {
                    trace!(cause = %e, "can't set TCP_NODELAY");
                }
                return Ok(tcp);
            }
            Err(TransportError::Io { source }) => {
                debug!(%address, cause = %source, "connect failed");
                last_error = Some(TransportError::connect(address, source));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| TransportError::resolve(&authority, "no address found")))
}

/// Listening socket that hands out [`Connection`]s, encrypted when a TLS context is set.
#[derive(Debug)]
pub struct Listener {
    tcp: TcpListener,
    tls: Option<Arc<ServerTlsContext>>,
    timeout: Timeout,
}

impl Listener {
    pub async fn bind(address: &str, tls: Option<Arc<ServerTlsContext>>, timeout: Timeout) -> Result<Self, TransportError> {
        let tcp = TcpListener::bind(address).await?;
        Ok(Self { tcp, tls, timeout })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.tcp.local_addr()?)
    }

    /// Accepts the next peer. The handshake is left to the caller, see [`Connection::handshake`].
    pub async fn accept(&self) -> Result<Connection, TransportError> {
        let (tcp, peer_addr) = self.tcp.accept().await?;
        trace!(%peer_addr, "accepted");
        if let Err(e) = tcp.set_nodelay(true) {
            trace!(cause = %e, "can't set TCP_NODELAY");
        }

        let socket = match &self.tls {
            Some(context) => TransportSocket::Encrypted(TlsSocket::server(tcp, context.clone())),
            None => TransportSocket::Plain(tcp),
        };
        Ok(Connection::new(socket, self.timeout))
    }
}
