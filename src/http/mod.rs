//! HTTP/1.1 server and client plumbing
//!
//! This module turns raw bytes into validated handler calls and handler
//! replies back into wire-correct responses.
//!
//! # Architecture
//!
//! - `Handler` is the seam between protocol mechanics and application logic:
//!   one operation per supported method (OPTIONS, HEAD, GET, POST, PUT, DELETE)
//! - `ThreadSafeHandler` serializes every call into a `SerialHandler`, so one
//!   stateful handler can be shared by all connections
//! - `Server` accepts connections and runs one `Session` per connection on its
//!   own thread; `dispatch` validates each request and assembles the response
//! - `HttpClient` / `http_client` perform a single blocking exchange against
//!   any HTTP/1.1 server
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use verbhttp::http::{HeadersAccess, Reply, SerialHandler, ThreadSafeHandler};
//!
//! struct Hello;
//!
//! impl SerialHandler for Hello {
//!     fn get(&mut self, target: &str, _headers: HeadersAccess<'_>) -> Reply {
//!         match target {
//!             "/hello" => Reply::new(200, "hello world", "text/plain"),
//!             _ => Reply::not_found(),
//!         }
//!     }
//! }
//!
//! let handler = Arc::new(ThreadSafeHandler::new(Hello));
//! verbhttp::run("127.0.0.1", 8080, handler, 64).unwrap();
//! ```

pub mod chunked;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod handler;
pub mod headers;
pub mod limit;
pub mod message;
pub mod parser;
pub mod server;
pub mod session;
pub mod transport;

pub use client::{http_client, ClientResponse, HttpClient};
pub use config::ServerConfig;
pub use handler::{
    Handler, HeadReply, HeadersAccess, PutReply, Reply, SerialHandler, ThreadSafeHandler,
};
pub use headers::{Fields, Headers};
pub use message::{HttpRequest, HttpResponse, Method, Status, Version};
pub use parser::{RequestParser, ResponseParser};
pub use server::{run, Server};
pub use session::Session;
pub use transport::Transport;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Header section exceeds {0} bytes")]
    HeaderTooLarge(usize),

    #[error("More than {0} header fields")]
    TooManyHeaders(usize),

    #[error("Body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("Partial message")]
    Incomplete,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Could not resolve {0}")]
    Resolve(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Status to answer with when this error came out of request parsing
    pub fn status(&self) -> Status {
        match self {
            Error::HeaderTooLarge(_) | Error::TooManyHeaders(_) => {
                Status::REQUEST_HEADER_FIELDS_TOO_LARGE
            }
            Error::BodyTooLarge(_) => Status::PAYLOAD_TOO_LARGE,
            Error::InvalidVersion(_) => Status::HTTP_VERSION_NOT_SUPPORTED,
            _ => Status::BAD_REQUEST,
        }
    }
}

/// Maximum number of header lines accepted per message
pub const MAX_HEADERS: usize = 100;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// CRLF line ending
pub const CRLF: &str = "\r\n";

/// Product token sent in `Server` and `User-Agent` headers
pub const PRODUCT: &str = concat!("verbhttp/", env!("CARGO_PKG_VERSION"));
