//! HTTP client
//!
//! [`HttpClient`] runs request/response exchanges over one connection.
//! [`http_client`] wraps a complete single exchange (resolve, connect,
//! write, read, shut down) in a call that never fails: every error comes
//! back as a synthetic 500 [`ClientResponse`].

use super::transport::shutdown_quietly;
use super::{
    Error, Headers, HttpRequest, HttpResponse, Method, ResponseParser, Result, Transport,
    DEFAULT_HTTP_PORT, PRODUCT,
};
use bytes::BytesMut;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use tracing::debug;

const READ_CHUNK: usize = 8192;

/// HTTP client over one connection
pub struct HttpClient<S: Transport> {
    stream: S,
    parser: ResponseParser,
    buf: BytesMut,
}

impl<S: Transport> HttpClient<S> {
    pub fn new(stream: S) -> Self {
        HttpClient {
            stream,
            parser: ResponseParser::new(),
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Write a request to the connection
    pub fn send_request(&mut self, request: &HttpRequest) -> Result<()> {
        self.stream.write_all(&request.to_wire())?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read the final response to the last request
    ///
    /// Interim 1xx responses other than `101 Switching Protocols` are
    /// skipped. `head_request` marks a response to HEAD, which has no body
    /// whatever its headers declare.
    pub fn receive_response(&mut self, head_request: bool) -> Result<HttpResponse> {
        loop {
            self.parser.set_head_request(head_request);
            let response = self.read_response()?;

            let status = response.status();
            if status.is_informational() && status.code() != 101 {
                continue;
            }
            return Ok(response);
        }
    }

    /// Send `request` and read its response
    pub fn exchange(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        self.send_request(request)?;
        self.receive_response(request.method() == Method::Head)
    }

    /// Shut down both directions; an already-disconnected peer is not an error
    pub fn close(&mut self) -> Result<()> {
        shutdown_quietly(&self.stream, Shutdown::Both)?;
        Ok(())
    }

    fn read_response(&mut self) -> Result<HttpResponse> {
        let mut chunk = [0u8; READ_CHUNK];
        let mut eof = false;

        loop {
            if let Some(response) = self.parser.parse(&mut self.buf, eof)? {
                return Ok(response);
            }
            if eof {
                return Err(Error::Incomplete);
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => eof = true,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Outcome of [`http_client`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
}

impl ClientResponse {
    /// Synthetic result standing in for a failed exchange
    pub fn failure(message: impl Into<String>) -> Self {
        ClientResponse {
            status: 500,
            headers: Headers::new(),
            body: message.into(),
        }
    }

    pub fn into_parts(self) -> (u16, Headers, String) {
        (self.status, self.headers, self.body)
    }
}

impl From<HttpResponse> for ClientResponse {
    fn from(response: HttpResponse) -> Self {
        ClientResponse {
            status: response.status().code(),
            headers: response.fields().to_headers(),
            body: String::from_utf8_lossy(response.body()).into_owned(),
        }
    }
}

/// Map a client method name to a [`Method`]
///
/// Names are matched case-insensitively; anything outside the six served
/// verbs means GET.
pub fn client_method(name: &str) -> Method {
    const VERBS: [(&str, Method); 6] = [
        ("options", Method::Options),
        ("head", Method::Head),
        ("get", Method::Get),
        ("post", Method::Post),
        ("put", Method::Put),
        ("delete", Method::Delete),
    ];

    VERBS
        .iter()
        .find(|(verb, _)| verb.eq_ignore_ascii_case(name))
        .map_or(Method::Get, |(_, method)| *method)
}

/// Perform one HTTP/1.1 exchange with `host:port`
///
/// Sends `Host`, `User-Agent`, the caller's `headers`, and, when `body` is
/// not empty, `Content-Length` with the body. Any failure along the way is
/// returned as status 500 with empty headers and the error message as body.
pub fn http_client(
    method: &str,
    host: &str,
    port: u16,
    target: &str,
    headers: Option<&Headers>,
    body: &str,
) -> ClientResponse {
    match exchange(client_method(method), host, port, target, headers, body) {
        Ok(response) => response.into(),
        Err(err) => {
            debug!(host, port, error = %err, "http client call failed");
            ClientResponse::failure(err.to_string())
        }
    }
}

fn exchange(
    method: Method,
    host: &str,
    port: u16,
    target: &str,
    headers: Option<&Headers>,
    body: &str,
) -> Result<HttpResponse> {
    let stream = connect(host, port)?;
    let request = build_request(method, host, port, target, headers, body);

    let mut client = HttpClient::new(stream);
    let response = client.exchange(&request)?;
    client.close()?;
    Ok(response)
}

/// Connect to the first reachable address `host:port` resolves to
fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let mut last_err = None;

    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(match last_err {
        Some(err) => err.into(),
        None => Error::Resolve(format!("{}:{}", host, port)),
    })
}

fn build_request(
    method: Method,
    host: &str,
    port: u16,
    target: &str,
    headers: Option<&Headers>,
    body: &str,
) -> HttpRequest {
    let host_field = if port == DEFAULT_HTTP_PORT {
        host.to_string()
    } else {
        format!("{}:{}", host, port)
    };
    let target = if target.is_empty() { "/" } else { target };

    let mut request = HttpRequest::builder()
        .method(method)
        .target(target)
        .header("Host", host_field)
        .header("User-Agent", PRODUCT)
        .build();

    if let Some(headers) = headers {
        for (name, value) in headers {
            request.fields_mut().set(name.as_str(), value.as_str());
        }
    }

    if !body.is_empty() {
        request
            .fields_mut()
            .set("Content-Length", body.len().to_string());
        request.set_body(body.as_bytes().to_vec());
    }

    request
}
