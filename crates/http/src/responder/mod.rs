//! Application boundary of the server.
//!
//! A [`Responder`] turns a parsed request into a response. It is handed the
//! request together with the [`Status`] the server computed while reading it,
//! so a responder may answer malformed or oversized requests itself; a `200`
//! status means the request was read completely.

use std::error::Error;
use std::future::Future;

use async_trait::async_trait;
use tracing::warn;

use crate::connection::ConnectionInfo;
use crate::protocol::{HttpError, Request, Response, Status};

#[async_trait]
pub trait Responder: Send + Sync {
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn respond(&self, request: Request, status: Status) -> Result<Response, Self::Error>;

    /// Called when a connection fails before any request reaches [`Responder::respond`],
    /// e.g. on a TLS handshake failure.
    async fn on_error(&self, info: &ConnectionInfo, error: &HttpError) {
        warn!(peer_addr = ?info.peer_addr, cause = %error, "connection failed");
    }
}

#[derive(Debug)]
pub struct ResponderFn<F> {
    f: F,
}

#[async_trait]
impl<Err, F, Fut> Responder for ResponderFn<F>
where
    F: Fn(Request, Status) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response, Err>> + Send,
{
    type Error = Err;

    async fn respond(&self, request: Request, status: Status) -> Result<Response, Self::Error> {
        (self.f)(request, status).await
    }
}

pub fn make_responder<F, Err, Ret>(f: F) -> ResponderFn<F>
where
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response, Err>>,
    F: Fn(Request, Status) -> Ret,
{
    ResponderFn { f }
}
