//! HTTP client with redirect following.
//!
//! Every logical request runs through the same states:
//!
//! ```text
//! Connect -> Send -> AwaitResponse -> EvaluateResponse -> Done
//!                         ^                  |
//!                         +---- Redirect <---+
//! ```
//!
//! A redirect reuses the connection when the new target has the same
//! authority and the server kept the connection open, otherwise a fresh
//! connection replaces the old one in place. A reused connection the server
//! closed before answering is replaced once and the request sent again.

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode, Uri};
use tokio::task::JoinHandle;
use tracing::debug;
use url::{Position, Url};

use crate::codec::{Http1Formatter, Http1Parser};
use crate::connection::{Authority, Connection};
use crate::protocol::{ClientError, ParseError, Request, Response, SendError, TransportError};
use crate::transport::{ClientTlsConfig, ClientTlsContext, Timeout};

const DEFAULT_MAX_REDIRECTS: usize = 8;
const DEFAULT_MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_USER_AGENT: &str = concat!("duplex-http/", env!("CARGO_PKG_VERSION"));

/// Headers describing a body, dropped when a redirect drops the body.
const CONTENT_HEADERS: [&str; 5] =
    ["Content-Length", "Content-Type", "Content-Encoding", "Content-Language", "Content-Location"];

#[derive(Debug)]
pub struct ClientBuilder {
    max_redirects: usize,
    max_response_size: usize,
    timeout: Timeout,
    user_agent: String,
    tls: Option<ClientTlsConfig>,
}

impl ClientBuilder {
    fn new() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            timeout: Timeout::new(DEFAULT_TIMEOUT),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            tls: None,
        }
    }

    /// How many redirects are followed, `0` returns redirect responses as they are.
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    pub fn timeout<T: Into<Timeout>>(mut self, timeout: T) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// TLS settings for `https` targets, the platform-independent webpki roots otherwise.
    pub fn tls(mut self, tls: ClientTlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn build(self) -> Result<Client, TransportError> {
        let tls = self.tls.unwrap_or_default().build()?;
        Ok(Client {
            inner: Arc::new(ClientInner {
                max_redirects: self.max_redirects,
                max_response_size: self.max_response_size,
                timeout: self.timeout,
                user_agent: self.user_agent,
                tls: Arc::new(tls),
            }),
        })
    }
}

/// Cheap to clone, clones share the TLS context and settings.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    max_redirects: usize,
    max_response_size: usize,
    timeout: Timeout,
    user_agent: String,
    tls: Arc<ClientTlsContext>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Opens a connection to the authority of `url`, TLS handshake included for `https`.
    pub async fn connect(&self, url: &Url) -> Result<Connection, ClientError> {
        self.connect_authority(Authority::from_url(url)?).await
    }

    async fn connect_authority(&self, authority: Authority) -> Result<Connection, ClientError> {
        let tls = authority.secure.then(|| Arc::clone(&self.inner.tls));
        let mut connection = Connection::open(authority, tls, self.inner.timeout).await?;
        connection.handshake().await?;
        Ok(connection)
    }

    /// Sends `request` over `connection` and follows redirects.
    ///
    /// `request` ends up as the last request sent, and `connection` as the
    /// connection it was sent over.
    pub async fn get_response(&self, connection: &mut Connection, request: &mut Request) -> Result<Response, ClientError> {
        if !connection.connected() {
            return Err(ClientError::NotConnected);
        }
        let authority = connection.authority().cloned().ok_or(ClientError::NotConnected)?;
        let mut target = target_url(&request.uri, &authority)?;
        self.process(request, &authority);

        let mut redirects = 0;
        let mut reused = false;
        loop {
            let response = match self.exchange(connection, request).await {
                Err(e) if reused && closed_before_response(&e, connection) => {
                    debug!(cause = %e, target = %target, "reused connection closed by peer, reconnecting");
                    let authority = connection.authority().cloned().ok_or(ClientError::NotConnected)?;
                    connection.shutdown().await;
                    *connection = self.connect_authority(authority).await?;
                    self.exchange(connection, request).await?
                }
                result => result?,
            };
            debug!(method = %request.method, target = %target, status = response.status.as_u16(), "response received");

            let location = match redirect_location(&response) {
                Some(location) if self.inner.max_redirects > 0 => location.to_owned(),
                _ => return Ok(response),
            };
            if redirects > self.inner.max_redirects {
                return Err(ClientError::TooManyRedirects { max: self.inner.max_redirects });
            }
            redirects += 1;

            let next = target.join(&location).map_err(|e| ClientError::invalid_redirect(&location, e))?;
            let next_authority =
                Authority::from_url(&next).map_err(|e| ClientError::invalid_redirect(&location, e))?;
            debug!(status = response.status.as_u16(), location = %next, redirects, "following redirect");

            reused = connection.authority() == Some(&next_authority) && !response.wants_close() && connection.connected();
            if !reused {
                connection.shutdown().await;
                *connection = self.connect_authority(next_authority.clone()).await?;
            }

            redirect_request(request, response.status.code());
            request.uri = next[Position::BeforePath..]
                .parse::<Uri>()
                .map_err(|e| ClientError::invalid_redirect(&location, e))?;
            request.headers.set_or_insert("Host", next_authority.host_header());
            target = next;
        }
    }

    /// Sends `request` once and reads the response to it.
    async fn exchange(&self, connection: &mut Connection, request: &mut Request) -> Result<Response, ClientError> {
        Http1Formatter::new().request(connection.send_stream(), request).await?;

        connection.expect_input(self.inner.max_response_size);
        let mut response = Http1Parser::new().response(&mut connection.receive_stream(), &request.method).await?;
        response.connection = Some(connection.info());
        request.connection = Some(connection.info());
        Ok(response)
    }

    /// Connects to the target of `request`, runs the exchange and closes the connection.
    ///
    /// The target must be an absolute `http` or `https` URI.
    pub async fn query(&self, mut request: Request) -> Result<Response, ClientError> {
        let url = Url::parse(&request.uri.to_string()).map_err(|e| ClientError::invalid_target(&request.uri, e))?;
        let mut connection = self.connect(&url).await?;

        let result = self.get_response(&mut connection, &mut request).await;
        connection.shutdown().await;
        result
    }

    /// Runs [`Client::query`] on a new task and hands the outcome to `callback`,
    /// together with the request as it was submitted.
    pub fn query_with<F>(&self, request: Request, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Request, Result<Response, ClientError>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            let result = client.query(request.clone()).await;
            callback(request, result);
        })
    }

    /// Adds the headers every request carries.
    fn process(&self, request: &mut Request, authority: &Authority) {
        if !request.headers.contains("Host") {
            request.headers.append("Host", authority.host_header());
        }
        if !request.headers.contains("User-Agent") {
            request.headers.append("User-Agent", self.inner.user_agent.as_str());
        }
    }
}

/// The absolute URL a request targets, from its URI or else the connection's authority.
fn target_url(uri: &Uri, authority: &Authority) -> Result<Url, ClientError> {
    let url = if uri.scheme().is_some() {
        uri.to_string()
    } else {
        let scheme = if authority.secure { "https" } else { "http" };
        let path = uri.path_and_query().map_or("/", |path| path.as_str());
        format!("{scheme}://{authority}{path}")
    };
    Url::parse(&url).map_err(|e| ClientError::invalid_target(uri, e))
}

/// The `Location` of a redirect, `304 Not Modified` is not one.
fn redirect_location(response: &Response) -> Option<&str> {
    let code = response.status.code();
    if !code.is_redirection() || code == StatusCode::NOT_MODIFIED {
        return None;
    }
    response.headers.get("Location")
}

/// Rewrites method and body for the next hop of a redirect with status `code`.
///
/// `307` and `308` repeat the request as it was. `303` turns anything but
/// `HEAD` into `GET`, `301` and `302` only turn `POST` into `GET`. A request
/// turned into `GET` loses its body and the headers describing it.
fn redirect_request(request: &mut Request, code: StatusCode) {
    if code == StatusCode::TEMPORARY_REDIRECT || code == StatusCode::PERMANENT_REDIRECT {
        return;
    }

    let downgrade = match code {
        StatusCode::SEE_OTHER => request.method != Method::HEAD,
        _ => request.method == Method::POST,
    };
    if downgrade {
        request.method = Method::GET;
        request.body.stop_output();
        for name in CONTENT_HEADERS {
            request.headers.remove(name);
        }
    }
}

/// Whether `error` shows the peer closed the connection without starting a response.
fn closed_before_response(error: &ClientError, connection: &Connection) -> bool {
    match error {
        ClientError::Parse(ParseError::Incomplete) => connection.input().is_empty(),
        ClientError::Transport(TransportError::Io { .. } | TransportError::NotConnected)
        | ClientError::Send(SendError::Io { .. } | SendError::Transport { source: TransportError::Io { .. } }) => true,
        _ => false,
    }
}
