use std::convert::Infallible;
use std::hint::black_box;

use bytes::BytesMut;
use criterion::{Criterion, criterion_group, criterion_main};
use duplex_http::agent::{Client, Server};
use duplex_http::codec::{Http1Formatter, RequestDecoder, ResponseDecoder, ResponseEncoder};
use duplex_http::protocol::{Request, Response, Status};
use duplex_http::responder::make_responder;
use http::{Method, StatusCode};
use tokio::runtime::Runtime;
use tokio_util::codec::{Decoder, Encoder};

async fn hello(_request: Request, status: Status) -> Result<Response, Infallible> {
    let mut response = Response::new(status);
    response.body.push_str("Hello World!");
    Ok(response)
}

fn bench_request_decoder(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&request[..]);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });

    let request = b"POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 27\r\n\r\n{\"name\":\"duplex\",\"id\":42}\n";

    c.bench_function("decode_request_with_body", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&request[..]);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });
}

fn bench_response_codec(c: &mut Criterion) {
    let mut response = Response::new(StatusCode::OK);
    response.headers.append("Server", "duplex-http");
    response.body.push_str("Hello World!");

    c.bench_function("encode_simple_response", |b| {
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            black_box(encoder.encode(&response, &mut bytes).unwrap());
        });
    });

    let mut encoded = BytesMut::new();
    Http1Formatter::new().format_response(&response, &mut encoded).unwrap();

    c.bench_function("decode_simple_response", |b| {
        b.iter(|| {
            let mut decoder = ResponseDecoder::new(&Method::GET);
            let mut bytes = encoded.clone();
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });
}

fn bench_loopback_exchange(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let (client, url) = runtime.block_on(async {
        let server = Server::builder().address("127.0.0.1:0").bind().await.unwrap();
        let url = format!("http://{}/", server.local_addr().unwrap());
        tokio::spawn(server.serve(make_responder(hello)));
        (Client::builder().build().unwrap(), url)
    });

    let client = &client;
    let url = url.as_str();
    c.bench_function("loopback_exchange", |b| {
        b.to_async(&runtime).iter(|| async move {
            let response = client.query(Request::get(url.parse().unwrap())).await.unwrap();
            black_box(response);
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_response_codec, bench_loopback_exchange);
criterion_main!(benches);
