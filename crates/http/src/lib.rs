//! An HTTP/1.x client and server protocol engine over plain TCP or TLS.
//!
//! This crate implements both sides of an HTTP/1.0 and HTTP/1.1 exchange on
//! top of tokio: a client that follows redirects and a server that answers
//! each accepted connection through a [`Responder`](responder::Responder).
//! Transport, buffering, wire format and the agents are separate layers, so
//! each can be used on its own.
//!
//! # Features
//!
//! - Plain and TLS transports (rustls) with configurable peer verification,
//!   mutual TLS included
//! - Per-operation timeouts and cancellation of pending I/O
//! - Bounded input: every read is capped by the bytes the current message may still use
//! - Redirect following with method rewriting and connection reuse
//! - Async agents, plus [`blocking`] front-ends that own their runtime
//!
//! # Example
//!
//! ```no_run
//! use duplex_http::agent::{Client, Server};
//! use duplex_http::protocol::{Request, Response, Status};
//! use duplex_http::responder::make_responder;
//! use std::convert::Infallible;
//! use tracing::{Level, error, info};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let server = match Server::builder().address("127.0.0.1:8080").bind().await {
//!         Ok(server) => server,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!     tokio::spawn(server.serve(make_responder(hello_world)));
//!
//!     let client = Client::builder().build().expect("default tls roots");
//!     let request = Request::get("http://127.0.0.1:8080/".parse().unwrap());
//!     match client.query(request).await {
//!         Ok(response) => info!(status = %response.status, body = %response.body.text(), "got response"),
//!         Err(e) => error!(cause = %e, "request failed"),
//!     }
//! }
//!
//! async fn hello_world(request: Request, status: Status) -> Result<Response, Infallible> {
//!     info!(path = request.uri.path(), "request received");
//!
//!     let mut response = Response::new(status);
//!     response.body.push_str("Hello World!\r\n");
//!     Ok(response)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`transport`]: plain and TLS sockets, timeouts, the listener
//! - [`connection`]: a socket with bounded input and batched output
//! - [`codec`]: HTTP/1.x parser and formatter, sans-IO decoders and encoders
//! - [`protocol`]: requests, responses, headers, bodies, statuses and errors
//! - [`agent`]: the client and server state machines
//! - [`responder`]: the server's application boundary
//! - [`blocking`]: synchronous client and server
//!
//! ## Error Handling
//!
//! Each layer has its own error type, every one of them classified by a
//! [`protocol::FailureKind`]:
//!
//! - [`protocol::TransportError`]: resolve, connect, TLS, timeouts, cancellation
//! - [`protocol::ParseError`]: malformed or oversized input
//! - [`protocol::SendError`]: messages that can't be formatted or sent
//! - [`protocol::ClientError`]: the one terminal failure of a client exchange
//! - [`protocol::HttpError`]: failures of one accepted connection
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - No chunked transfer-coding, bodies are framed by `Content-Length`
//!   (responses may also end with the connection)
//! - One exchange per server connection
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod agent;
pub mod blocking;
pub mod codec;
pub mod connection;
pub mod protocol;
pub mod responder;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;
