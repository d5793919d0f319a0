use std::convert::Infallible;

use duplex_http::agent::Server;
use duplex_http::protocol::{Request, Response, Status};
use duplex_http::responder::make_responder;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

async fn echo(mut request: Request, status: Status) -> Result<Response, Infallible> {
    info!(method = %request.method, path = request.uri.path(), status = %status, "request received");

    let mut response = Response::new(status);
    if request.body.has_data() {
        let content_type = request.body.content_type().cloned().unwrap_or(mime::APPLICATION_OCTET_STREAM);
        response.body.start_output(content_type);
        response.body.push_bytes(&request.body.take_data());
    } else {
        response.body.push_str(&format!("{} {}\r\n", request.method, request.uri));
    }
    Ok(response)
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = match Server::builder().address("127.0.0.1:8080").bind().await {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    server.serve_with_shutdown(make_responder(echo), shutdown).await;
}
