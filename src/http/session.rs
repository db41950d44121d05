//! Connection session
//!
//! One [`Session`] owns one accepted connection and drives it through the
//! request cycle until the connection closes:
//!
//! ```text
//! Reading -> Dispatching -> Writing -> Reading ...
//!    |                         |
//!    +-------> Closing <-------+
//! ```
//!
//! Reading takes at most one request off a read buffer that persists across
//! requests, so pipelined bytes are never lost. Requests are answered
//! strictly in arrival order.

use super::dispatch::{dispatch, reject};
use super::transport::{is_benign, shutdown_quietly};
use super::{Handler, HttpRequest, HttpResponse, RequestParser, ServerConfig, Transport};
use bytes::BytesMut;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bytes requested from the transport per read
const READ_CHUNK: usize = 8192;

/// Where a session is in the request cycle
#[derive(Debug)]
enum State {
    Reading,
    Dispatching(HttpRequest),
    Writing { response: HttpResponse, close: bool },
    Closing,
}

/// Request loop over one connection
pub struct Session<S: Transport> {
    stream: S,
    peer: Option<SocketAddr>,
    handler: Arc<dyn Handler>,
    server_name: String,
    parser: RequestParser,
    buf: BytesMut,
    served: usize,
}

impl<S: Transport> Session<S> {
    pub fn new(stream: S, handler: Arc<dyn Handler>, config: &ServerConfig) -> Self {
        let peer = stream.peer_addr();
        Session {
            stream,
            peer,
            handler,
            server_name: config.server_name.clone(),
            parser: RequestParser::with_limits(config.max_header_bytes, config.max_body_bytes),
            buf: BytesMut::with_capacity(READ_CHUNK),
            served: 0,
        }
    }

    /// Serve requests until the connection closes
    ///
    /// Returns the number of responses written. Errors end the session and
    /// are logged; they never escape.
    pub fn run(mut self) -> usize {
        let mut state = State::Reading;

        loop {
            state = match state {
                State::Reading => self.read_request(),
                State::Dispatching(request) => self.dispatch(request),
                State::Writing { response, close } => self.write_response(response, close),
                State::Closing => {
                    self.close();
                    return self.served;
                }
            };
        }
    }

    fn read_request(&mut self) -> State {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            match self.parser.parse(&mut self.buf) {
                Ok(Some(request)) => return State::Dispatching(request),
                Ok(None) => {}
                Err(err) => {
                    debug!(peer = ?self.peer, error = %err, "rejecting malformed request");
                    return State::Writing {
                        response: reject(&err, &self.server_name),
                        close: true,
                    };
                }
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    if !self.parser.is_idle() || !self.buf.is_empty() {
                        debug!(
                            peer = ?self.peer,
                            buffered = self.buf.len(),
                            "peer closed mid-request"
                        );
                    }
                    return State::Closing;
                }
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    self.fail("read", &err);
                    return State::Closing;
                }
            }
        }
    }

    fn dispatch(&mut self, request: HttpRequest) -> State {
        let response = dispatch(self.handler.as_ref(), &request, &self.server_name);
        let close = response.need_eof() || !request.keep_alive();

        debug!(
            peer = ?self.peer,
            method = %request.method(),
            path = request.target(),
            status = response.status().code(),
            "request served"
        );

        State::Writing { response, close }
    }

    fn write_response(&mut self, response: HttpResponse, close: bool) -> State {
        let wire = response.to_wire();

        if let Err(err) = self.stream.write_all(&wire).and_then(|_| self.stream.flush()) {
            self.fail("write", &err);
            return State::Closing;
        }
        self.served += 1;

        if close {
            State::Closing
        } else {
            State::Reading
        }
    }

    fn close(&mut self) {
        if let Err(err) = shutdown_quietly(&self.stream, Shutdown::Write) {
            self.fail("shutdown", &err);
        }
        debug!(peer = ?self.peer, served = self.served, "connection closed");
    }

    fn fail(&self, what: &str, err: &io::Error) {
        if !is_benign(err) {
            warn!(peer = ?self.peer, error = %err, "{} failed", what);
        }
    }
}
