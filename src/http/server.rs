//! HTTP server
//!
//! [`Server`] owns a bound listener and runs the acceptor loop: one thread
//! per accepted connection, each running a [`Session`] until the connection
//! closes. The number of live sessions is bounded by
//! [`ServerConfig::max_connections`]; at the bound, acceptance pauses until
//! a session ends.

use super::limit::ConnectionLimiter;
use super::transport::is_benign;
use super::{Handler, Result, ServerConfig, Session};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// First pause after a failed `accept`
const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Longest pause between `accept` retries
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying `accept` after consecutive failures
///
/// Doubles per failure up to [`ACCEPT_BACKOFF_MAX`] so an exhausted descriptor
/// table does not turn the acceptor into a busy loop.
#[derive(Debug, Default)]
struct AcceptBackoff {
    failures: u32,
}

impl AcceptBackoff {
    /// Record a failure and return how long to wait before the next attempt
    fn failed(&mut self) -> Duration {
        let delay = ACCEPT_BACKOFF_BASE
            .saturating_mul(2u32.saturating_pow(self.failures))
            .min(ACCEPT_BACKOFF_MAX);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    fn succeeded(&mut self) {
        self.failures = 0;
    }
}

/// Bound HTTP server
pub struct Server {
    listener: TcpListener,
    handler: Arc<dyn Handler>,
    config: Arc<ServerConfig>,
    limiter: ConnectionLimiter,
}

impl Server {
    /// Bind the listening socket described by `config`
    ///
    /// Port 0 binds an ephemeral port; see [`Server::local_addr`].
    pub fn bind(config: ServerConfig, handler: Arc<dyn Handler>) -> Result<Self> {
        let listener = listen(config.socket_addr(), config.backlog)?;
        let limiter = ConnectionLimiter::new(config.max_connections);

        Ok(Server {
            listener,
            handler,
            config: Arc::new(config),
            limiter,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accept connections forever
    ///
    /// Failures of a single connection, including a session thread that
    /// cannot be started, are logged and never end the loop.
    pub fn serve(self) -> Result<()> {
        info!(
            addr = ?self.listener.local_addr().ok(),
            max_connections = ?self.config.max_connections,
            "listening"
        );

        let mut backoff = AcceptBackoff::default();
        loop {
            let permit = self.limiter.acquire();

            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(err) if is_benign(&err) => continue,
                Err(err) => {
                    let delay = backoff.failed();
                    warn!(error = %err, retry_in = ?delay, "accept failed");
                    drop(permit);
                    thread::sleep(delay);
                    continue;
                }
            };
            backoff.succeeded();
            debug!(%peer, active = self.limiter.active(), "connection accepted");

            let handler = Arc::clone(&self.handler);
            let config = Arc::clone(&self.config);
            let name = format!("http-{}", peer);
            start_session(
                |session| thread::Builder::new().name(name).spawn(session).map(drop),
                peer,
                move || {
                    let _permit = permit;
                    Session::new(stream, handler, &config).run();
                },
            );
        }
    }
}

/// Hand `session` to `spawn`
///
/// When the thread cannot be started the session closure is dropped, and
/// with it the stream and permit it owns.
fn start_session<F, S>(spawn: S, peer: SocketAddr, session: F)
where
    F: FnOnce() + Send + 'static,
    S: FnOnce(F) -> io::Result<()>,
{
    if let Err(err) = spawn(session) {
        warn!(%peer, error = %err, "cannot start session thread, dropping connection");
    }
}

/// Create a listening socket with address reuse
fn listen(addr: SocketAddr, backlog: i32) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    Ok(socket.into())
}

/// Serve `handler` on `address:port` until the process exits
///
/// `max_connections` bounds concurrent connections; 0 means unbounded.
/// Returns only when the server cannot start, for instance on an invalid
/// address or a port already in use.
pub fn run(
    address: &str,
    port: u16,
    handler: Arc<dyn Handler>,
    max_connections: usize,
) -> Result<()> {
    let result = ServerConfig::new(address, port)
        .map(|config| config.with_max_connections(max_connections))
        .and_then(|config| Server::bind(config, handler))
        .and_then(Server::serve);

    if let Err(err) = &result {
        error!(address, port, error = %err, "server failed");
    }
    result
}
