//! HTTP message types
//!
//! This module defines the core types for HTTP requests and responses.

use super::headers::is_token_byte;
use super::{Error, Fields, Result, CRLF};
use std::fmt;

/// HTTP methods
///
/// Any syntactically valid method token that is not one of the named
/// methods parses as [`Method::Unknown`]; whether a method is served is
/// decided by the dispatcher, not the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
    Unknown,
}

impl Method {
    /// Parse method from a request-line token
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "CONNECT" => Ok(Method::Connect),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "PATCH" => Ok(Method::Patch),
            _ if !s.is_empty() && s.bytes().all(is_token_byte) => Ok(Method::Unknown),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }

    /// Convert method to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
            Method::Unknown => "UNKNOWN",
        }
    }

    /// Whether a handler has an operation for this method
    pub fn is_dispatchable(&self) -> bool {
        matches!(
            self,
            Method::Options
                | Method::Head
                | Method::Get
                | Method::Post
                | Method::Put
                | Method::Delete
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    /// Parse version from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }

    /// Convert version to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

impl Status {
    /// Create a new status code
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Status { code })
        } else {
            Err(Error::InvalidStatus(format!("Invalid status code: {}", code)))
        }
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the canonical reason phrase for this status code
    pub fn reason_phrase(&self) -> &'static str {
        match self.code {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            203 => "Non-Authoritative Information",
            204 => "No Content",
            205 => "Reset Content",
            206 => "Partial Content",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            305 => "Use Proxy",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            402 => "Payment Required",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            407 => "Proxy Authentication Required",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            411 => "Length Required",
            412 => "Precondition Failed",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            415 => "Unsupported Media Type",
            416 => "Range Not Satisfiable",
            417 => "Expectation Failed",
            422 => "Unprocessable Content",
            426 => "Upgrade Required",
            429 => "Too Many Requests",
            431 => "Request Header Fields Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => "Unknown",
        }
    }

    /// Check if this is an informational status (1xx)
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Whether a response with this status may carry a payload
    pub fn allows_body(&self) -> bool {
        !(self.is_informational() || self.code == 204 || self.code == 304)
    }

    /// Whether a response with this status may declare `Content-Length`
    pub fn allows_content_length(&self) -> bool {
        !(self.is_informational() || self.code == 204)
    }

    // Common status codes as constants
    pub const OK: Status = Status { code: 200 };
    pub const NO_CONTENT: Status = Status { code: 204 };
    pub const BAD_REQUEST: Status = Status { code: 400 };
    pub const NOT_FOUND: Status = Status { code: 404 };
    pub const PAYLOAD_TOO_LARGE: Status = Status { code: 413 };
    pub const REQUEST_HEADER_FIELDS_TOO_LARGE: Status = Status { code: 431 };
    pub const INTERNAL_SERVER_ERROR: Status = Status { code: 500 };
    pub const HTTP_VERSION_NOT_SUPPORTED: Status = Status { code: 505 };
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}

/// Keep-alive semantics of a message: HTTP/1.1 persists unless
/// `Connection: close`, HTTP/1.0 only with `Connection: keep-alive`.
fn connection_keep_alive(version: Version, fields: &Fields) -> bool {
    match version {
        Version::Http11 => !fields.has_token("Connection", "close"),
        Version::Http10 => fields.has_token("Connection", "keep-alive"),
    }
}

fn write_head(buf: &mut Vec<u8>, start_line: [&str; 3], fields: &Fields) {
    buf.extend_from_slice(start_line[0].as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(start_line[1].as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(start_line[2].as_bytes());
    buf.extend_from_slice(CRLF.as_bytes());

    for (name, value) in fields.iter() {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(CRLF.as_bytes());
    }

    buf.extend_from_slice(CRLF.as_bytes());
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    target: String,
    version: Version,
    fields: Fields,
    body: Vec<u8>,
}

impl HttpRequest {
    /// Create a new HTTP request
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        HttpRequest {
            method,
            target: target.into(),
            version: Version::default(),
            fields: Fields::new(),
            body: Vec::new(),
        }
    }

    /// Create a builder for constructing requests
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// Get the request method
    pub fn method(&self) -> Method {
        self.method
    }

    /// Get the request target
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the header fields
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Get mutable header fields
    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    /// Get the body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Set the body
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    /// Whether the peer wants the connection kept open after this request
    pub fn keep_alive(&self) -> bool {
        connection_keep_alive(self.version, &self.fields)
    }

    /// Convert the request to wire format
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256 + self.body.len());
        write_head(
            &mut buf,
            [self.method.as_str(), self.target.as_str(), self.version.as_str()],
            &self.fields,
        );
        buf.extend_from_slice(&self.body);
        buf
    }
}

/// Builder for HTTP requests
#[derive(Debug, Default)]
pub struct HttpRequestBuilder {
    method: Option<Method>,
    target: Option<String>,
    version: Option<Version>,
    fields: Fields,
    body: Vec<u8>,
}

impl HttpRequestBuilder {
    /// Set the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the request target
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the HTTP version
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name, value);
        self
    }

    /// Replace all header fields
    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    /// Set the body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Build the request
    pub fn build(self) -> HttpRequest {
        HttpRequest {
            method: self.method.unwrap_or(Method::Get),
            target: self.target.unwrap_or_else(|| "/".to_string()),
            version: self.version.unwrap_or_default(),
            fields: self.fields,
            body: self.body,
        }
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    version: Version,
    status: Status,
    reason: String,
    fields: Fields,
    body: Vec<u8>,
}

impl HttpResponse {
    /// Create a new HTTP response
    pub fn new(status: Status) -> Self {
        HttpResponse {
            version: Version::default(),
            status,
            reason: status.reason_phrase().to_string(),
            fields: Fields::new(),
            body: Vec::new(),
        }
    }

    /// Create a builder for constructing responses
    pub fn builder() -> HttpResponseBuilder {
        HttpResponseBuilder::default()
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the status code
    pub fn status(&self) -> Status {
        self.status
    }

    /// Get the reason phrase
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Get the header fields
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Get mutable header fields
    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    /// Get the body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Set the body
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    /// Whether this response leaves the connection open
    pub fn keep_alive(&self) -> bool {
        connection_keep_alive(self.version, &self.fields)
    }

    /// Declare the keep-alive preference through the `Connection` field
    ///
    /// Only the non-default case for the response's version is written:
    /// `close` for HTTP/1.1, `keep-alive` for HTTP/1.0.
    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.fields.remove("Connection");
        match (self.version, keep_alive) {
            (Version::Http11, false) => self.fields.insert("Connection", "close"),
            (Version::Http10, true) => self.fields.insert("Connection", "keep-alive"),
            _ => {}
        }
    }

    /// Whether the connection must be closed once this response is written
    ///
    /// True when the response does not persist, or when its payload has no
    /// declared length and can only be delimited by closing the connection.
    pub fn need_eof(&self) -> bool {
        if !self.keep_alive() {
            return true;
        }
        self.status.allows_body()
            && !self.fields.contains("Content-Length")
            && !self.fields.has_token("Transfer-Encoding", "chunked")
    }

    /// Convert the response to wire format
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256 + self.body.len());
        let code = self.status.code().to_string();
        write_head(
            &mut buf,
            [self.version.as_str(), code.as_str(), self.reason.as_str()],
            &self.fields,
        );
        buf.extend_from_slice(&self.body);
        buf
    }
}

/// Builder for HTTP responses
#[derive(Debug, Default)]
pub struct HttpResponseBuilder {
    version: Option<Version>,
    status: Option<Status>,
    reason: Option<String>,
    fields: Fields,
    body: Vec<u8>,
}

impl HttpResponseBuilder {
    /// Set the HTTP version
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Set the status code
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the reason phrase
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name, value);
        self
    }

    /// Replace all header fields
    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    /// Set the body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Build the response
    pub fn build(self) -> HttpResponse {
        let status = self.status.unwrap_or(Status::OK);
        let reason = self
            .reason
            .unwrap_or_else(|| status.reason_phrase().to_string());
        HttpResponse {
            version: self.version.unwrap_or_default(),
            status,
            reason,
            fields: self.fields,
            body: self.body,
        }
    }
}
