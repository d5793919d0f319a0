//! TLS configuration, contexts and the encrypted socket.
//!
//! A [`ServerTlsConfig`] / [`ClientTlsConfig`] is turned into an immutable
//! context once, when the agent is built. Every connection then borrows the
//! context through an `Arc`, so concurrent handshakes need no locking.
//!
//! Peer verification follows [`VerifyMode`]:
//!
//! | mode     | server role                           | client role                                    |
//! |----------|---------------------------------------|------------------------------------------------|
//! | None     | no client certificate requested       | server certificate not checked                 |
//! | Optional | requested, verified when presented    | handshake always proceeds, outcome is recorded |
//! | Strict   | a valid client certificate is needed  | handshake fails unless the chain is trusted    |

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::mem;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::{TlsAcceptor, TlsConnector, TlsStream};
use tracing::{debug, warn};

use crate::ensure;
use crate::protocol::TransportError;

const ALPN_HTTP_11: &[u8] = b"http/1.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifyMode {
    None,
    Optional,
    Strict,
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Reads every certificate of a PEM file.
pub fn load_certs<P: AsRef<Path>>(path: P) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    let path = path.as_ref();
    let mut reader = open_pem(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::tls(format!("can't read certificates from {}: {e}", path.display())))?;
    ensure!(!certs.is_empty(), TransportError::tls(format!("no certificate found in {}", path.display())));
    Ok(certs)
}

/// Reads the first private key (PKCS#8, PKCS#1 or SEC1) of a PEM file.
pub fn load_private_key<P: AsRef<Path>>(path: P) -> Result<PrivateKeyDer<'static>, TransportError> {
    let path = path.as_ref();
    let mut reader = open_pem(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TransportError::tls(format!("can't read private key from {}: {e}", path.display())))?
        .ok_or_else(|| TransportError::tls(format!("no private key found in {}", path.display())))
}

fn open_pem(path: &Path) -> Result<BufReader<File>, TransportError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| TransportError::tls(format!("can't open {}: {e}", path.display())))
}

fn add_authorities(roots: &mut RootCertStore, certs: Vec<CertificateDer<'static>>) -> Result<(), TransportError> {
    for cert in certs {
        roots.add(cert).map_err(TransportError::tls)?;
    }
    Ok(())
}

/// Server identity plus the client verification policy.
pub struct ServerTlsConfig {
    certificates: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
    client_roots: RootCertStore,
    verify_mode: VerifyMode,
}

impl ServerTlsConfig {
    /// A server identity that does not ask clients for certificates.
    pub fn new(certificates: Vec<CertificateDer<'static>>, private_key: PrivateKeyDer<'static>) -> Self {
        Self { certificates, private_key, client_roots: RootCertStore::empty(), verify_mode: VerifyMode::None }
    }

    pub fn from_pem_files<C: AsRef<Path>, K: AsRef<Path>>(cert_path: C, key_path: K) -> Result<Self, TransportError> {
        Ok(Self::new(load_certs(cert_path)?, load_private_key(key_path)?))
    }

    /// Trusts `certificate` as an issuer of client certificates.
    pub fn with_client_authority(mut self, certificate: CertificateDer<'static>) -> Result<Self, TransportError> {
        add_authorities(&mut self.client_roots, vec![certificate])?;
        Ok(self)
    }

    pub fn load_client_authority<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TransportError> {
        add_authorities(&mut self.client_roots, load_certs(path)?)?;
        Ok(self)
    }

    pub fn verify_mode(mut self, verify_mode: VerifyMode) -> Self {
        self.verify_mode = verify_mode;
        self
    }

    pub(crate) fn build(self) -> Result<ServerTlsContext, TransportError> {
        let provider = provider();
        let builder = ServerConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(TransportError::tls)?;

        let builder = match self.verify_mode {
            VerifyMode::None => builder.with_no_client_auth(),
            mode => {
                let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(self.client_roots), provider);
                let verifier = if mode == VerifyMode::Optional { verifier.allow_unauthenticated() } else { verifier };
                builder.with_client_cert_verifier(verifier.build().map_err(TransportError::tls)?)
            }
        };

        let mut config = builder.with_single_cert(self.certificates, self.private_key).map_err(TransportError::tls)?;
        config.alpn_protocols = vec![ALPN_HTTP_11.to_vec()];

        Ok(ServerTlsContext { acceptor: TlsAcceptor::from(Arc::new(config)), verify_mode: self.verify_mode })
    }
}

impl fmt::Debug for ServerTlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerTlsConfig")
            .field("certificates", &self.certificates.len())
            .field("client_roots", &self.client_roots.len())
            .field("verify_mode", &self.verify_mode)
            .finish_non_exhaustive()
    }
}

/// Trust anchors, optional client identity and the server verification policy.
///
/// Starts with the Mozilla root set from `webpki-roots` and [`VerifyMode::Strict`].
pub struct ClientTlsConfig {
    roots: RootCertStore,
    identity: Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)>,
    verify_mode: VerifyMode,
}

impl ClientTlsConfig {
    pub fn new() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self { roots, identity: None, verify_mode: VerifyMode::Strict }
    }

    /// Starts from an empty trust store instead of the Mozilla roots.
    pub fn without_default_roots(mut self) -> Self {
        self.roots = RootCertStore::empty();
        self
    }

    pub fn with_cert_authority(mut self, certificate: CertificateDer<'static>) -> Result<Self, TransportError> {
        add_authorities(&mut self.roots, vec![certificate])?;
        Ok(self)
    }

    pub fn load_cert_authority<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TransportError> {
        add_authorities(&mut self.roots, load_certs(path)?)?;
        Ok(self)
    }

    /// Client certificate chain and key presented when the server asks for one.
    pub fn with_identity(mut self, certificates: Vec<CertificateDer<'static>>, private_key: PrivateKeyDer<'static>) -> Self {
        self.identity = Some((certificates, private_key));
        self
    }

    pub fn load_identity<C: AsRef<Path>, K: AsRef<Path>>(self, cert_path: C, key_path: K) -> Result<Self, TransportError> {
        Ok(self.with_identity(load_certs(cert_path)?, load_private_key(key_path)?))
    }

    pub fn verify_mode(mut self, verify_mode: VerifyMode) -> Self {
        self.verify_mode = verify_mode;
        self
    }

    pub(crate) fn build(self) -> Result<ClientTlsContext, TransportError> {
        let provider = provider();
        let roots = Arc::new(self.roots);
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(TransportError::tls)?;

        let (builder, post_verifier) = match self.verify_mode {
            VerifyMode::Strict => (builder.with_root_certificates(roots), None),
            mode => {
                let post_verifier = if mode == VerifyMode::Optional && !roots.is_empty() {
                    let verifier = WebPkiServerVerifier::builder_with_provider(roots, provider.clone())
                        .build()
                        .map_err(TransportError::tls)?;
                    Some(verifier)
                } else {
                    None
                };
                let accept_any = Arc::new(AcceptAnyServerCert { provider });
                (builder.dangerous().with_custom_certificate_verifier(accept_any), post_verifier)
            }
        };

        let mut config = match self.identity {
            Some((certificates, private_key)) => {
                builder.with_client_auth_cert(certificates, private_key).map_err(TransportError::tls)?
            }
            None => builder.with_no_client_auth(),
        };
        config.alpn_protocols = vec![ALPN_HTTP_11.to_vec()];

        Ok(ClientTlsContext {
            connector: TlsConnector::from(Arc::new(config)),
            verify_mode: self.verify_mode,
            post_verifier,
        })
    }
}

impl Default for ClientTlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientTlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTlsConfig")
            .field("roots", &self.roots.len())
            .field("identity", &self.identity.is_some())
            .field("verify_mode", &self.verify_mode)
            .finish()
    }
}

pub struct ServerTlsContext {
    acceptor: TlsAcceptor,
    verify_mode: VerifyMode,
}

impl fmt::Debug for ServerTlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerTlsContext").field("verify_mode", &self.verify_mode).finish_non_exhaustive()
    }
}

pub struct ClientTlsContext {
    connector: TlsConnector,
    verify_mode: VerifyMode,
    post_verifier: Option<Arc<WebPkiServerVerifier>>,
}

impl ClientTlsContext {
    /// Whether the certificates the server presented can be trusted.
    fn verified(&self, server_name: &ServerName<'_>, certificates: Option<&[CertificateDer<'static>]>) -> bool {
        match self.verify_mode {
            VerifyMode::Strict => true,
            VerifyMode::None => false,
            VerifyMode::Optional => match (&self.post_verifier, certificates) {
                (Some(verifier), Some([end_entity, intermediates @ ..])) => {
                    match verifier.verify_server_cert(end_entity, intermediates, server_name, &[], UnixTime::now()) {
                        Ok(_) => true,
                        Err(e) => {
                            warn!(cause = %e, "server certificate not verified");
                            false
                        }
                    }
                }
                _ => false,
            },
        }
    }
}

impl fmt::Debug for ClientTlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTlsContext").field("verify_mode", &self.verify_mode).finish_non_exhaustive()
    }
}

/// Accepts any server certificate while still checking handshake signatures.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

/// A TCP stream that becomes a TLS stream once [`TlsSocket::handshake`] succeeds.
///
/// Reading or writing before the handshake fails with `NotConnected`. A
/// failed handshake leaves the socket unusable.
pub struct TlsSocket {
    stage: Stage,
}

enum Stage {
    Pending { tcp: TcpStream, role: Role },
    Ready { stream: Box<TlsStream<TcpStream>>, peer_verified: bool },
    Failed,
}

enum Role {
    Server(Arc<ServerTlsContext>),
    Client { context: Arc<ClientTlsContext>, server_name: ServerName<'static> },
}

impl TlsSocket {
    pub(crate) fn server(tcp: TcpStream, context: Arc<ServerTlsContext>) -> Self {
        Self { stage: Stage::Pending { tcp, role: Role::Server(context) } }
    }

    pub(crate) fn client(tcp: TcpStream, context: Arc<ClientTlsContext>, server_name: ServerName<'static>) -> Self {
        Self { stage: Stage::Pending { tcp, role: Role::Client { context, server_name } } }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.stage, Stage::Ready { .. })
    }

    pub fn peer_verified(&self) -> bool {
        matches!(self.stage, Stage::Ready { peer_verified: true, .. })
    }

    pub(crate) fn tcp(&self) -> Option<&TcpStream> {
        match &self.stage {
            Stage::Pending { tcp, .. } => Some(tcp),
            Stage::Ready { stream, .. } => Some(stream.get_ref().0),
            Stage::Failed => None,
        }
    }

    pub async fn handshake(&mut self) -> Result<(), TransportError> {
        match mem::replace(&mut self.stage, Stage::Failed) {
            Stage::Pending { tcp, role: Role::Server(context) } => {
                let stream = context.acceptor.accept(tcp).await.map_err(|source| TransportError::Handshake { source })?;
                let peer_verified =
                    context.verify_mode != VerifyMode::None && stream.get_ref().1.peer_certificates().is_some();
                debug!(peer_verified, "server handshake finished");
                self.stage = Stage::Ready { stream: Box::new(stream.into()), peer_verified };
            }
            Stage::Pending { tcp, role: Role::Client { context, server_name } } => {
                let stream = context
                    .connector
                    .connect(server_name.clone(), tcp)
                    .await
                    .map_err(|source| TransportError::Handshake { source })?;
                let peer_verified = context.verified(&server_name, stream.get_ref().1.peer_certificates());
                debug!(peer_verified, "client handshake finished");
                self.stage = Stage::Ready { stream: Box::new(stream.into()), peer_verified };
            }
            ready @ Stage::Ready { .. } => self.stage = ready,
            Stage::Failed => return Err(TransportError::NotConnected),
        }
        Ok(())
    }

    fn ready_stream(&mut self) -> io::Result<&mut TlsStream<TcpStream>> {
        match &mut self.stage {
            Stage::Ready { stream, .. } => Ok(&mut **stream),
            _ => Err(io::Error::new(io::ErrorKind::NotConnected, "tls handshake not completed")),
        }
    }
}

impl fmt::Debug for TlsSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match &self.stage {
            Stage::Pending { .. } => "pending",
            Stage::Ready { .. } => "ready",
            Stage::Failed => "failed",
        };
        f.debug_struct("TlsSocket").field("stage", &stage).field("peer_verified", &self.peer_verified()).finish()
    }
}

impl AsyncRead for TlsSocket {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().ready_stream() {
            Ok(stream) => Pin::new(stream).poll_read(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl AsyncWrite for TlsSocket {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut().ready_stream() {
            Ok(stream) => Pin::new(stream).poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().ready_stream() {
            Ok(stream) => Pin::new(stream).poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().stage {
            Stage::Ready { stream, .. } => Pin::new(&mut **stream).poll_shutdown(cx),
            Stage::Pending { tcp, .. } => Pin::new(tcp).poll_shutdown(cx),
            Stage::Failed => Poll::Ready(Ok(())),
        }
    }
}
