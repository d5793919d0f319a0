#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::net::SocketAddr;
use std::time::Duration;

use duplex_http::agent::{Server, ServerBuilder};
use duplex_http::protocol::{Request, Response, Status};
use duplex_http::responder::Responder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

pub fn fixture(name: &str) -> String {
    format!("{FIXTURES}/{name}")
}

pub fn init_tracing() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).with_test_writer().finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// A running server, stopped when dropped.
pub struct TestServer {
    pub address: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.address)
    }

    pub fn secure_url(&self, path: &str) -> String {
        format!("https://{}{path}", self.address)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub async fn start<R: Responder + 'static>(builder: ServerBuilder, responder: R) -> TestServer {
    init_tracing();
    let server = builder.address("127.0.0.1:0").bind().await.unwrap();
    let address = server.local_addr().unwrap();

    let (shutdown, signal) = oneshot::channel::<()>();
    tokio::spawn(server.serve_with_shutdown(responder, async {
        let _ = signal.await;
    }));

    TestServer { address, shutdown: Some(shutdown) }
}

pub async fn start_default<R: Responder + 'static>(responder: R) -> TestServer {
    start(Server::builder(), responder).await
}

/// Writes `bytes` as they are and reads until the server closes.
pub async fn raw_exchange(address: SocketAddr, bytes: &[u8]) -> String {
    let mut stream = TcpStream::connect(address).await.unwrap();
    stream.write_all(bytes).await.unwrap();

    let mut received = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received)).await;
    String::from_utf8_lossy(&received).into_owned()
}

/// Answers with the request status and echoes method, path and body.
pub async fn echo(request: Request, status: Status) -> Result<Response, std::convert::Infallible> {
    let mut response = Response::new(status);
    response.headers.append("X-Method", request.method.as_str());
    response.headers.append("X-Path", request.uri.path());
    if request.body.has_data() {
        response.body.start_output(request.body.content_type().cloned().unwrap_or(mime::APPLICATION_OCTET_STREAM));
        response.body.push_bytes(request.body.data());
    }
    Ok(response)
}
