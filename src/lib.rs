//! verbhttp - embeddable HTTP/1.1 server and synchronous client
//!
//! An application implements one callback per HTTP method (the
//! [`Handler`](http::Handler) contract); the server accepts connections,
//! parses and validates requests, calls the matching callback and writes
//! the reply back with correct framing. The same crate provides a blocking
//! one-shot client call, [`http_client`], that never fails across its own
//! boundary.

pub mod http;

pub use http::client::{http_client, ClientResponse};
pub use http::server::run;
