//! Server configuration

use super::parser::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEADER_BYTES};
use super::{Error, Result, PRODUCT};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default listen backlog
pub const DEFAULT_BACKLOG: i32 = 128;

/// Settings for a [`Server`](super::Server)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind; must be an IP literal
    pub address: IpAddr,
    /// Port to bind; 0 picks an ephemeral port
    pub port: u16,
    /// Concurrent connection bound; `None` means unbounded
    pub max_connections: Option<usize>,
    pub backlog: i32,
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
    /// Value of the `Server` header on every response
    pub server_name: String,
}

impl ServerConfig {
    /// Configuration for `address:port` with default limits
    ///
    /// Fails with [`Error::Config`] when `address` is not an IP literal.
    pub fn new(address: &str, port: u16) -> Result<Self> {
        let address = address
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| Error::Config(format!("invalid bind address {:?}", address)))?;

        Ok(ServerConfig {
            address,
            port,
            ..ServerConfig::default()
        })
    }

    /// Bound the number of concurrent connections; 0 means unbounded
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = (max_connections > 0).then_some(max_connections);
        self
    }

    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.max_header_bytes = max_header_bytes;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = server_name.into();
        self
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            max_connections: None,
            backlog: DEFAULT_BACKLOG,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            server_name: PRODUCT.to_string(),
        }
    }
}
