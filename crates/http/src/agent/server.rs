//! HTTP server running one exchange per connection.
//!
//! Each accepted connection is handled on its own tokio task:
//!
//! 1. transport handshake, a failure goes to [`Responder::on_error`]
//! 2. request head, then the body once its declared length is accepted
//! 3. the [`Responder`] gets the request with the status computed while reading it
//! 4. the response is sent with `Connection: close` and the connection is closed

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use http::StatusCode;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{Http1Formatter, Http1Parser};
use crate::connection::Connection;
use crate::protocol::request::is_standard_method;
use crate::protocol::{HttpError, ParseError, Request, Response, Status, TransportError};
use crate::responder::Responder;
use crate::transport::{Listener, ServerTlsConfig, Timeout};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_REQUEST_BODY: usize = 8 * 1024 * 1024;

#[derive(Debug)]
pub struct ServerBuilder {
    address: Option<String>,
    timeout: Timeout,
    max_request_body: usize,
    tls: Option<ServerTlsConfig>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { address: None, timeout: Timeout::new(DEFAULT_TIMEOUT), max_request_body: DEFAULT_MAX_REQUEST_BODY, tls: None }
    }

    /// Address to listen on, e.g. `127.0.0.1:8080`; port `0` picks a free port.
    pub fn address<A: Into<String>>(mut self, address: A) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn timeout<T: Into<Timeout>>(mut self, timeout: T) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Largest accepted request body; bigger ones are answered with `413` unread.
    pub fn max_request_body(mut self, max_request_body: usize) -> Self {
        self.max_request_body = max_request_body;
        self
    }

    pub fn tls(mut self, tls: ServerTlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub async fn bind(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?;
        let tls = match self.tls {
            Some(tls) => Some(Arc::new(tls.build().map_err(|source| ServerBuildError::Tls { source })?)),
            None => None,
        };
        let listener = Listener::bind(&address, tls, self.timeout)
            .await
            .map_err(|source| ServerBuildError::Bind { address, source })?;

        Ok(Server { listener, max_request_body: self.max_request_body })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid tls configuration: {source}")]
    Tls { source: TransportError },
    #[error("can't bind {address}: {source}")]
    Bind { address: String, source: TransportError },
    #[error("can't start the runtime: {source}")]
    Runtime {
        #[from]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct Server {
    listener: Listener,
    max_request_body: usize,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr()
    }

    /// Accepts connections forever.
    pub async fn serve<R: Responder + 'static>(self, responder: R) {
        self.serve_with_shutdown(responder, std::future::pending()).await;
    }

    /// Accepts connections until `signal` completes. Exchanges already running are not interrupted.
    pub async fn serve_with_shutdown<R, S>(self, responder: R, signal: S)
    where
        R: Responder + 'static,
        S: Future<Output = ()>,
    {
        match self.local_addr() {
            Ok(address) => info!(%address, "start listening"),
            Err(e) => warn!(cause = %e, "start listening on an unknown address"),
        }

        let responder = Arc::new(responder);
        let max_request_body = self.max_request_body;
        tokio::pin!(signal);

        loop {
            let connection = tokio::select! {
                () = &mut signal => {
                    info!("shutdown signal received, stop listening");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(connection) => connection,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            let responder = Arc::clone(&responder);
            tokio::spawn(async move {
                handle_connection(connection, responder.as_ref(), max_request_body).await;
            });
        }
    }
}

/// Runs one exchange on `connection` and closes it.
async fn handle_connection<R: Responder>(mut connection: Connection, responder: &R, max_request_body: usize) {
    let info = connection.info();
    if let Err(source) = connection.handshake().await {
        responder.on_error(&info, &HttpError::HandshakeError { source }).await;
        return;
    }
    let info = connection.info();

    let (mut request, status) = match read_request(&mut connection, max_request_body).await {
        Ok(Some(read)) => read,
        Ok(None) => {
            trace!(peer_addr = ?info.peer_addr, "peer closed before sending a request");
            connection.close();
            return;
        }
        Err(e) => {
            debug!(peer_addr = ?info.peer_addr, cause = %e, "failed to read request");
            (Request::default(), Status::new(error_status(&e)))
        }
    };
    request.connection = Some(info);

    let method = request.method.clone();
    let version = request.version;
    let peer_expects_close = request.wants_close();
    let mut response = match AssertUnwindSafe(responder.respond(request, status)).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            let e: Box<dyn std::error::Error + Send + Sync> = e.into();
            error!(cause = %e, "responder failed");
            Response::simple(StatusCode::INTERNAL_SERVER_ERROR, version)
        }
        Err(_) => {
            error!("responder panicked");
            Response::simple(StatusCode::INTERNAL_SERVER_ERROR, version)
        }
    };

    // the connection is closed after every exchange, so say so unless the peer assumes it
    if response.version >= http::Version::HTTP_11 || !peer_expects_close {
        response.headers.set_or_insert("Connection", "close");
    }
    response.clean_body_for(&method);
    response.connection = Some(info);

    if connection.writable() {
        if let Err(e) = Http1Formatter::new().response(connection.send_stream(), &response).await {
            responder.on_error(&info, &HttpError::from(e)).await;
        }
    } else {
        debug!(status = response.status.as_u16(), "connection closed, response dropped");
    }

    connection.shutdown().await;
    trace!(peer_addr = ?info.peer_addr, status = response.status.as_u16(), "finished process, connection shutdown");
}

/// Reads a request, `Ok(None)` when the peer closed without sending anything.
///
/// Outcomes the responder still answers (an oversized body, an extension
/// method) come back as `Ok` with a non-`200` status.
async fn read_request(connection: &mut Connection, max_request_body: usize) -> Result<Option<(Request, Status)>, ParseError> {
    let parser = Http1Parser::new();
    let mut stream = connection.receive_stream();

    stream.expect_unbounded();
    let Some((mut request, payload_size)) = parser.request_head(&mut stream).await? else {
        return Ok(None);
    };

    let length = payload_size.length().unwrap_or(0);
    let length = match usize::try_from(length) {
        Ok(length) if length <= max_request_body => length,
        _ => {
            debug!(length, max_request_body, "request body too large");
            return Ok(Some((request, Status::new(StatusCode::PAYLOAD_TOO_LARGE))));
        }
    };
    stream.expect_input(length);
    parser.body(&mut stream, &mut request, payload_size).await?;

    let status = if is_standard_method(&request.method) { StatusCode::OK } else { StatusCode::NOT_IMPLEMENTED };
    Ok(Some((request, Status::new(status))))
}

fn error_status(e: &ParseError) -> StatusCode {
    match e {
        e if e.is_timeout() => StatusCode::REQUEST_TIMEOUT,
        ParseError::TooLargeHeader { .. } | ParseError::TooManyHeaders { .. } => {
            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
        }
        ParseError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ParseError::UnsupportedTransferEncoding { .. } => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::BAD_REQUEST,
    }
}
