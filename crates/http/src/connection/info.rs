use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::protocol::ClientError;

/// Snapshot of a connection, attached to the messages that travelled over it.
///
/// Holding one never keeps the connection open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub local_addr: Option<SocketAddr>,
    pub peer_addr: Option<SocketAddr>,
    pub encrypted: bool,
    /// whether the peer presented a certificate that was verified during the handshake
    pub peer_verified: bool,
}

/// The remote endpoint a client connection was opened for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Authority {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl Authority {
    /// Extracts the authority of an absolute `http` or `https` URL, filling in the default port.
    pub fn from_url(url: &Url) -> Result<Self, ClientError> {
        let secure = match url.scheme() {
            "http" => false,
            "https" => true,
            scheme => return Err(ClientError::invalid_target(url, format!("unsupported scheme {scheme}"))),
        };
        let host = url.host_str().ok_or_else(|| ClientError::invalid_target(url, "missing host"))?;
        let port = url.port_or_known_default().ok_or_else(|| ClientError::invalid_target(url, "missing port"))?;

        Ok(Self { host: host.to_owned(), port, secure })
    }

    /// The value of a `Host` header for this authority, omitting the default port.
    pub fn host_header(&self) -> String {
        let default_port = if self.secure { 443 } else { 80 };
        if self.port == default_port { self.host.clone() } else { self.to_string() }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
