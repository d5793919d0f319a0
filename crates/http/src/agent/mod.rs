//! Client and server state machines on top of the codec and the connection.
//!
//! - [`Client`]: sends requests and follows redirects
//! - [`Server`]: accepts connections and answers each one through a
//!   [`Responder`](crate::responder::Responder)

mod client;
mod server;

pub use client::{Client, ClientBuilder};
pub use server::{Server, ServerBuildError, ServerBuilder};
