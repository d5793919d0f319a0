//! Synchronous front-ends for callers without a tokio runtime.
//!
//! Both types own a runtime and drive the asynchronous agents on it, so the
//! protocol behaviour is the same in both modes.

use std::io;
use std::net::SocketAddr;
use std::thread;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, error};
use url::Url;

use crate::agent::{self, ServerBuildError, ServerBuilder};
use crate::connection::Connection;
use crate::protocol::{ClientError, Request, Response};
use crate::responder::Responder;

/// A [`agent::Client`] driven on its own current-thread runtime.
#[derive(Debug)]
pub struct Client {
    client: agent::Client,
    runtime: Runtime,
}

impl Client {
    pub fn new(client: agent::Client) -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { client, runtime })
    }

    pub fn connect(&self, url: &Url) -> Result<Connection, ClientError> {
        self.runtime.block_on(self.client.connect(url))
    }

    pub fn get_response(&self, connection: &mut Connection, request: &mut Request) -> Result<Response, ClientError> {
        self.runtime.block_on(self.client.get_response(connection, request))
    }

    pub fn query(&self, request: Request) -> Result<Response, ClientError> {
        self.runtime.block_on(self.client.query(request))
    }
}

/// Runs a server on a background thread.
#[derive(Debug)]
pub struct Server;

impl Server {
    /// Binds on the calling thread, so configuration and bind errors are
    /// reported here, then serves on a background thread until the returned
    /// handle is stopped or dropped.
    pub fn start<R: Responder + 'static>(builder: ServerBuilder, responder: R) -> Result<ServerHandle, ServerBuildError> {
        let runtime = Builder::new_multi_thread().enable_all().build()?;
        let server = runtime.block_on(builder.bind())?;
        let local_addr = server.local_addr().map_err(|source| ServerBuildError::Bind { address: "local".into(), source })?;

        let (shutdown, signal) = oneshot::channel::<()>();
        let thread = thread::Builder::new().name("duplex-http-server".into()).spawn(move || {
            runtime.block_on(server.serve_with_shutdown(responder, async {
                // a dropped sender stops the server too
                let _ = signal.await;
            }));
        })?;

        Ok(ServerHandle { local_addr, shutdown: Some(shutdown), thread: Some(thread) })
    }
}

#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and waits for the background thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            match thread.join() {
                Ok(()) => debug!(address = %self.local_addr, "server stopped"),
                Err(_) => error!(address = %self.local_addr, "server thread panicked"),
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
