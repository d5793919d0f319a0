mod common;

use common::echo;
use duplex_http::agent::{Client, Server};
use duplex_http::blocking;
use duplex_http::protocol::{ClientError, Request};
use duplex_http::responder::make_responder;
use http::StatusCode;
use url::Url;

#[test]
fn exchange_without_outer_runtime() {
    common::init_tracing();
    let server = blocking::Server::start(Server::builder().address("127.0.0.1:0"), make_responder(echo)).unwrap();
    let client = blocking::Client::new(Client::builder().build().unwrap()).unwrap();

    let mut request = Request::post(format!("http://{}/sync", server.local_addr()).parse().unwrap());
    request.body.push_str("blocking");
    let response = client.query(request).unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get("X-Path"), Some("/sync"));
    assert_eq!(response.body.text(), "blocking");

    server.stop();
}

#[test]
fn connection_reused_for_get_response() {
    let server = blocking::Server::start(Server::builder().address("127.0.0.1:0"), make_responder(echo)).unwrap();
    let client = blocking::Client::new(Client::builder().build().unwrap()).unwrap();

    let url = Url::parse(&format!("http://{}/", server.local_addr())).unwrap();
    let mut connection = client.connect(&url).unwrap();
    let mut request = Request::get("/first".parse().unwrap());
    let response = client.get_response(&mut connection, &mut request).unwrap();
    assert_eq!(response.headers.get("X-Path"), Some("/first"));

    // the server closes after each exchange
    let mut request = Request::get("/second".parse().unwrap());
    let result = client.get_response(&mut connection, &mut request);
    assert!(result.is_err());
}

#[test]
fn dropped_server_stops_listening() {
    let server = blocking::Server::start(Server::builder().address("127.0.0.1:0"), make_responder(echo)).unwrap();
    let address = server.local_addr();
    drop(server);

    let client = blocking::Client::new(Client::builder().build().unwrap()).unwrap();
    let result = client.query(Request::get(format!("http://{address}/").parse().unwrap()));

    assert!(matches!(result, Err(ClientError::Transport(_))));
}
