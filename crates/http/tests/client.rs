mod common;

use std::time::Duration;

use common::{echo, start_default};
use duplex_http::agent::Client;
use duplex_http::protocol::{ClientError, FailureKind, ParseError, Request, Response, Status, TransportError};
use duplex_http::responder::make_responder;
use http::{Method, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use url::Url;

fn redirect(code: StatusCode, location: &str) -> Response {
    let mut response = Response::new(code);
    response.headers.append("Location", location);
    response
}

/// `/start` -> 302 `/middle` -> 307 `/end`, `/keep` -> 308 `/echo`, `/loop` -> 302 `/loop`,
/// `/r0` -> `/r1` -> `/r2` -> `/r3` -> `/done`
async fn redirecting(request: Request, status: Status) -> Result<Response, std::convert::Infallible> {
    let response = match request.uri.path() {
        "/r0" => redirect(StatusCode::FOUND, "/r1"),
        "/r1" => redirect(StatusCode::FOUND, "/r2"),
        "/r2" => redirect(StatusCode::FOUND, "/r3"),
        "/r3" => redirect(StatusCode::FOUND, "/done"),
        "/start" => redirect(StatusCode::FOUND, "/middle"),
        "/middle" => redirect(StatusCode::TEMPORARY_REDIRECT, "end"),
        "/keep" => redirect(StatusCode::PERMANENT_REDIRECT, "/echo"),
        "/other" => redirect(StatusCode::SEE_OTHER, "/echo?from=other"),
        "/loop" => redirect(StatusCode::FOUND, "/loop"),
        "/bad" => redirect(StatusCode::FOUND, "ftp://files.example.com/"),
        _ => return common::echo(request, status).await,
    };
    Ok(response)
}

#[tokio::test]
async fn post_is_downgraded_by_found() {
    let server = start_default(make_responder(redirecting)).await;
    let client = Client::builder().build().unwrap();

    let mut request = Request::post(server.url("/start").parse().unwrap());
    request.body.push_str("payload");
    let response = client.query(request).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get("X-Method"), Some("GET"));
    assert_eq!(response.headers.get("X-Path"), Some("/end"));
    assert!(!response.body.has_data());
}

#[tokio::test]
async fn permanent_redirect_keeps_method_and_body() {
    let server = start_default(make_responder(redirecting)).await;
    let client = Client::builder().build().unwrap();

    let mut request = Request::post(server.url("/keep").parse().unwrap());
    request.body.push_str("payload");
    let response = client.query(request).await.unwrap();

    assert_eq!(response.headers.get("X-Method"), Some("POST"));
    assert_eq!(response.headers.get("X-Path"), Some("/echo"));
    assert_eq!(response.body.text(), "payload");
}

#[tokio::test]
async fn see_other_downgrades_put() {
    let server = start_default(make_responder(redirecting)).await;
    let client = Client::builder().build().unwrap();

    let mut request = Request::new(Method::PUT, server.url("/other").parse().unwrap());
    request.body.push_str("payload");
    let response = client.query(request).await.unwrap();

    assert_eq!(response.headers.get("X-Method"), Some("GET"));
    assert!(!response.body.has_data());
}

#[tokio::test]
async fn redirect_loop_is_bounded() {
    let server = start_default(make_responder(redirecting)).await;
    let client = Client::builder().max_redirects(3).build().unwrap();

    let result = client.query(Request::get(server.url("/loop").parse().unwrap())).await;

    assert!(matches!(result, Err(ClientError::TooManyRedirects { max: 3 })));
    assert_eq!(result.unwrap_err().kind(), FailureKind::Policy);
}

#[tokio::test]
async fn redirect_budget_allows_one_more_hop_than_max() {
    let server = start_default(make_responder(redirecting)).await;
    let client = Client::builder().max_redirects(2).build().unwrap();

    let response = client.query(Request::get(server.url("/r1").parse().unwrap())).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get("X-Path"), Some("/done"));

    let result = client.query(Request::get(server.url("/r0").parse().unwrap())).await;
    assert!(matches!(result, Err(ClientError::TooManyRedirects { max: 2 })));
}

#[tokio::test]
async fn single_redirect_budget_follows_two_hops() {
    let server = start_default(make_responder(redirecting)).await;
    let client = Client::builder().max_redirects(1).build().unwrap();

    let response = client.query(Request::get(server.url("/start").parse().unwrap())).await.unwrap();
    assert_eq!(response.headers.get("X-Path"), Some("/end"));

    let result = client.query(Request::get(server.url("/r1").parse().unwrap())).await;
    assert!(matches!(result, Err(ClientError::TooManyRedirects { max: 1 })));
}

#[tokio::test]
async fn zero_redirects_returns_redirect() {
    let server = start_default(make_responder(redirecting)).await;
    let client = Client::builder().max_redirects(0).build().unwrap();

    let response = client.query(Request::get(server.url("/start").parse().unwrap())).await.unwrap();

    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(response.headers.get("Location"), Some("/middle"));
}

#[tokio::test]
async fn unsupported_redirect_scheme() {
    let server = start_default(make_responder(redirecting)).await;
    let client = Client::builder().build().unwrap();

    let result = client.query(Request::get(server.url("/bad").parse().unwrap())).await;

    assert!(matches!(result, Err(ClientError::InvalidRedirect { location, .. }) if location.starts_with("ftp://")));
}

#[tokio::test]
async fn redirect_to_another_authority_reconnects() {
    let target = start_default(make_responder(echo)).await;
    let location = target.url("/landing");
    let origin = start_default(make_responder(move |_: Request, _: Status| {
        let location = location.clone();
        async move { Ok::<_, std::convert::Infallible>(redirect(StatusCode::MOVED_PERMANENTLY, &location)) }
    }))
    .await;

    let client = Client::builder().build().unwrap();
    let url = Url::parse(&origin.url("/")).unwrap();
    let mut connection = client.connect(&url).await.unwrap();
    let mut request = Request::get("/".parse().unwrap());

    let response = client.get_response(&mut connection, &mut request).await.unwrap();

    assert_eq!(response.headers.get("X-Path"), Some("/landing"));
    assert_eq!(response.connection.unwrap().peer_addr, Some(target.address));
    assert_eq!(request.headers.get("Host"), Some(target.address.to_string().as_str()));
    assert_eq!(request.uri.path(), "/landing");
    assert_eq!(connection.info().peer_addr, Some(target.address));
}

#[tokio::test]
async fn closed_connection_is_not_connected() {
    let server = start_default(make_responder(echo)).await;
    let client = Client::builder().build().unwrap();

    let mut connection = client.connect(&Url::parse(&server.url("/")).unwrap()).await.unwrap();
    connection.close();

    let result = client.get_response(&mut connection, &mut Request::default()).await;
    assert!(matches!(result, Err(ClientError::NotConnected)));
}

#[tokio::test]
async fn host_and_user_agent_are_added() {
    let responder = make_responder(|request: Request, status: Status| async move {
        let mut response = Response::new(status);
        response.body.push_str(request.headers.get("Host").unwrap_or_default());
        response.body.push_str(" ");
        response.body.push_str(request.headers.get("User-Agent").unwrap_or_default());
        Ok::<_, std::convert::Infallible>(response)
    });
    let server = start_default(responder).await;
    let client = Client::builder().user_agent("probe/1.0").build().unwrap();

    let response = client.query(Request::get(server.url("/").parse().unwrap())).await.unwrap();

    assert_eq!(response.body.text(), format!("{} probe/1.0", server.address));
}

#[tokio::test]
async fn relative_target_is_rejected_by_query() {
    let client = Client::builder().build().unwrap();

    let result = client.query(Request::get("/relative".parse().unwrap())).await;

    assert!(matches!(result, Err(ClientError::InvalidTarget { .. })));
}

#[tokio::test]
async fn unresolvable_host() {
    let client = Client::builder().timeout(Duration::from_secs(5)).build().unwrap();

    let result = client.query(Request::get("http://name.invalid/".parse().unwrap())).await;

    assert!(matches!(
        result,
        Err(ClientError::Transport(TransportError::Resolve { .. } | TransportError::Timeout(_)))
    ));
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = Client::builder().timeout(Duration::from_millis(100)).build().unwrap();
    let result = client.query(Request::get(format!("http://{address}/").parse().unwrap())).await;

    let error = result.unwrap_err();
    assert!(error.is_timeout());
    assert!(matches!(error, ClientError::Transport(TransportError::Timeout(_))));
}

#[tokio::test]
async fn response_larger_than_allowed() {
    let responder = make_responder(|_: Request, status: Status| async move {
        let mut response = Response::new(status);
        response.body.push_bytes(&[b'x'; 4096]);
        Ok::<_, std::convert::Infallible>(response)
    });
    let server = start_default(responder).await;
    let client = Client::builder().max_response_size(1024).build().unwrap();

    let result = client.query(Request::get(server.url("/").parse().unwrap())).await;

    assert!(matches!(result, Err(ClientError::Parse(ParseError::TooLarge { limit: 1024 }))));
}

#[tokio::test]
async fn query_with_invokes_callback() {
    let server = start_default(make_responder(echo)).await;
    let client = Client::builder().build().unwrap();
    let (sender, receiver) = oneshot::channel();

    let request = Request::get(server.url("/callback").parse().unwrap());
    client
        .query_with(request, move |request, result| {
            let _ = sender.send((request.uri.to_string(), result.map(|response| response.status.as_u16())));
        })
        .await
        .unwrap();

    let (uri, status) = receiver.await.unwrap();
    assert!(uri.ends_with("/callback"));
    assert_eq!(status.unwrap(), 200);
}

/// Reads a bodyless request head, then answers with `response` and closes.
async fn answer_once(stream: &mut TcpStream, response: &[u8]) -> String {
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    while !received.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
    }
    stream.write_all(response).await.unwrap();
    stream.shutdown().await.unwrap();
    String::from_utf8(received).unwrap()
}

#[tokio::test]
async fn redirect_after_silent_close_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut first, _) = listener.accept().await.unwrap();
        let head = answer_once(&mut first, b"HTTP/1.1 302 Found\r\nLocation: /b\r\nContent-Length: 0\r\n\r\n").await;
        assert!(head.starts_with("GET /a HTTP/1.1\r\n"));
        drop(first);

        let (mut second, _) = listener.accept().await.unwrap();
        answer_once(&mut second, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await
    });

    let client = Client::builder().timeout(Duration::from_secs(5)).build().unwrap();
    let response = client.query(Request::get(format!("http://{address}/a").parse().unwrap())).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.text(), "ok");
    let second_head = server.await.unwrap();
    assert!(second_head.starts_with("GET /b HTTP/1.1\r\n"));
}
