//! Fetches a url with the blocking client and prints the response.
//!
//! ```text
//! cargo run --example fetch -- https://example.com/
//! ```

use std::process::ExitCode;

use duplex_http::agent::Client;
use duplex_http::blocking;
use duplex_http::codec::Http1Formatter;
use duplex_http::protocol::Request;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let Some(target) = std::env::args().nth(1) else {
        eprintln!("usage: fetch <url>");
        return ExitCode::FAILURE;
    };
    let uri = match target.parse() {
        Ok(uri) => uri,
        Err(e) => {
            error!(cause = %e, target, "invalid url");
            return ExitCode::FAILURE;
        }
    };

    let client = Client::builder().build().expect("default tls roots");
    let client = blocking::Client::new(client).expect("current thread runtime");

    match client.query(Request::get(uri)) {
        Ok(response) => {
            print!("{}", Http1Formatter::dump_response(&response));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(cause = %e, kind = ?e.kind(), "request failed");
            ExitCode::FAILURE
        }
    }
}
