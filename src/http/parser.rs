//! HTTP message parsing
//!
//! This module provides incremental parsers for HTTP requests and responses.
//! Both work on a caller-owned [`BytesMut`] that persists across messages:
//! a parser consumes exactly the bytes of one message and leaves whatever
//! follows (the next pipelined request, for instance) in the buffer.

use super::chunked::ChunkedDecoder;
use super::{
    Error, Fields, HttpRequest, HttpResponse, Method, Result, Status, Version, MAX_HEADERS,
};
use bytes::{Buf, BytesMut};

/// Default limit for a request's header section, in bytes
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Default limit for a request body, in bytes
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Header section limit applied to responses read by the client
const MAX_RESPONSE_HEAD_BYTES: usize = 64 * 1024;

/// Find the end of a header section (index just past the empty line)
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// Parse HTTP request line
///
/// Format: METHOD TARGET VERSION\r\n
/// Example: GET /index.html HTTP/1.1\r\n
pub fn parse_request_line(line: &str) -> Result<(Method, String, Version)> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() != 3 {
        return Err(Error::Parse(format!(
            "Invalid request line: expected 3 parts, got {}",
            parts.len()
        )));
    }

    let method = Method::from_str(parts[0])?;
    let target = parts[1].to_string();
    let version = Version::from_str(parts[2])?;

    Ok((method, target, version))
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON\r\n
/// Example: HTTP/1.1 200 OK\r\n
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::Parse(format!(
            "Invalid status line: expected at least 2 parts, got {}",
            parts.len()
        )));
    }

    let version = Version::from_str(parts[0])?;
    let status_code = parts[1]
        .parse::<u16>()
        .map_err(|_| Error::Parse(format!("Invalid status code: {}", parts[1])))?;
    let status = Status::new(status_code)?;
    let reason = match parts.get(2) {
        Some(reason) => reason.to_string(),
        None => status.reason_phrase().to_string(),
    };

    Ok((version, status, reason))
}

/// Split a complete header section off the front of `buf`
///
/// Returns the start line and the header fields, or `None` while the empty
/// line terminating the section has not arrived yet.
fn split_head(buf: &mut BytesMut, max_bytes: usize) -> Result<Option<(String, Fields)>> {
    // RFC 9112 2.2: ignore empty lines received before the start line
    while buf.starts_with(b"\r\n") {
        buf.advance(2);
    }

    let end = match find_head_end(buf) {
        Some(end) if end > max_bytes => return Err(Error::HeaderTooLarge(max_bytes)),
        Some(end) => end,
        None if buf.len() > max_bytes => return Err(Error::HeaderTooLarge(max_bytes)),
        None => return Ok(None),
    };

    let head = buf.split_to(end);
    let text = String::from_utf8_lossy(&head[..end - 4]);
    let mut lines = text.split("\r\n");
    let start_line = lines.next().unwrap_or_default().to_string();

    let mut fields = Fields::new();
    for line in lines {
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(Error::InvalidHeader("Obsolete line folding".to_string()));
        }
        if fields.len() == MAX_HEADERS {
            return Err(Error::TooManyHeaders(MAX_HEADERS));
        }
        let (name, value) = Fields::parse_header_line(line)?;
        fields.insert(name, value);
    }

    Ok(Some((start_line, fields)))
}

/// Value of a `Content-Length` field, rejecting malformed or conflicting values
fn content_length(fields: &Fields) -> Result<Option<usize>> {
    let mut length = None;

    for value in fields.get_all("Content-Length") {
        for part in value.split(',').map(str::trim) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::Parse(format!("Invalid Content-Length: {}", value)));
            }
            let n = part
                .parse::<usize>()
                .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", value)))?;
            match length {
                Some(prev) if prev != n => {
                    return Err(Error::Parse(format!(
                        "Conflicting Content-Length: {} and {}",
                        prev, n
                    )))
                }
                _ => length = Some(n),
            }
        }
    }

    Ok(length)
}

/// Whether the final transfer coding applied to the message is `chunked`
fn is_chunked(fields: &Fields) -> bool {
    fields
        .get_all("Transfer-Encoding")
        .into_iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|coding| !coding.is_empty())
        .last()
        .is_some_and(|coding| coding.eq_ignore_ascii_case("chunked"))
}

/// How the body of a message is delimited
#[derive(Debug)]
enum Framing {
    Empty,
    Length(usize),
    Chunked {
        decoder: ChunkedDecoder,
        body: Vec<u8>,
    },
    UntilEof {
        body: Vec<u8>,
    },
}

impl Framing {
    fn chunked(max_trailer_bytes: usize) -> Self {
        Framing::Chunked {
            decoder: ChunkedDecoder::with_trailer_limit(max_trailer_bytes),
            body: Vec::new(),
        }
    }

    fn for_request(fields: &Fields, max_header: usize, max_body: usize) -> Result<Self> {
        if fields.contains("Transfer-Encoding") {
            // RFC 9112 6.3: a request whose final coding is not chunked
            // cannot be delimited
            return if is_chunked(fields) {
                Ok(Framing::chunked(max_header))
            } else {
                Err(Error::Protocol("Unsupported transfer coding".to_string()))
            };
        }

        match content_length(fields)? {
            Some(n) if n > max_body => Err(Error::BodyTooLarge(max_body)),
            Some(0) | None => Ok(Framing::Empty),
            Some(n) => Ok(Framing::Length(n)),
        }
    }

    fn for_response(status: Status, fields: &Fields, head_request: bool) -> Result<Self> {
        if head_request || !status.allows_body() {
            return Ok(Framing::Empty);
        }

        if fields.contains("Transfer-Encoding") {
            return Ok(if is_chunked(fields) {
                Framing::chunked(MAX_RESPONSE_HEAD_BYTES)
            } else {
                Framing::UntilEof { body: Vec::new() }
            });
        }

        match content_length(fields)? {
            Some(0) => Ok(Framing::Empty),
            Some(n) => Ok(Framing::Length(n)),
            None => Ok(Framing::UntilEof { body: Vec::new() }),
        }
    }

    /// Take the body out of `buf` once it is complete
    fn poll(&mut self, buf: &mut BytesMut, eof: bool, limit: usize) -> Result<Option<Vec<u8>>> {
        match self {
            Framing::Empty => Ok(Some(Vec::new())),

            Framing::Length(n) => {
                if buf.len() >= *n {
                    Ok(Some(buf.split_to(*n).to_vec()))
                } else if eof {
                    Err(Error::Incomplete)
                } else {
                    Ok(None)
                }
            }

            Framing::Chunked { decoder, body } => {
                let (consumed, complete) = decoder.decode(&buf[..], body)?;
                buf.advance(consumed);

                if body.len() > limit {
                    Err(Error::BodyTooLarge(limit))
                } else if complete {
                    Ok(Some(std::mem::take(body)))
                } else if eof {
                    Err(Error::Incomplete)
                } else {
                    Ok(None)
                }
            }

            Framing::UntilEof { body } => {
                body.extend_from_slice(buf);
                buf.clear();

                if body.len() > limit {
                    Err(Error::BodyTooLarge(limit))
                } else if eof {
                    Ok(Some(std::mem::take(body)))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

/// Request whose head is parsed but whose body is still arriving
#[derive(Debug)]
struct PendingRequest {
    method: Method,
    target: String,
    version: Version,
    fields: Fields,
    framing: Framing,
}

/// HTTP request parser
#[derive(Debug)]
pub struct RequestParser {
    max_header_bytes: usize,
    max_body_bytes: usize,
    pending: Option<PendingRequest>,
}

impl RequestParser {
    /// Create a new request parser with the default size limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_BODY_BYTES)
    }

    /// Create a request parser with explicit header and body limits
    pub fn with_limits(max_header_bytes: usize, max_body_bytes: usize) -> Self {
        RequestParser {
            max_header_bytes,
            max_body_bytes,
            pending: None,
        }
    }

    /// Try to take one complete request off the front of `buf`
    ///
    /// Returns Ok(Some(request)) when a complete request is parsed,
    /// Ok(None) if more data is needed, or Err on parse error. After an
    /// error the connection's byte stream is no longer in a known state.
    pub fn parse(&mut self, buf: &mut BytesMut) -> Result<Option<HttpRequest>> {
        let mut pending = match self.pending.take() {
            Some(pending) => pending,
            None => match split_head(buf, self.max_header_bytes)? {
                Some((line, fields)) => {
                    let (method, target, version) = parse_request_line(&line)?;
                    let framing = Framing::for_request(
                        &fields,
                        self.max_header_bytes,
                        self.max_body_bytes,
                    )?;
                    PendingRequest {
                        method,
                        target,
                        version,
                        fields,
                        framing,
                    }
                }
                None => return Ok(None),
            },
        };

        match pending.framing.poll(buf, false, self.max_body_bytes)? {
            Some(body) => Ok(Some(
                HttpRequest::builder()
                    .method(pending.method)
                    .target(pending.target)
                    .version(pending.version)
                    .fields(pending.fields)
                    .body(body)
                    .build(),
            )),
            None => {
                self.pending = Some(pending);
                Ok(None)
            }
        }
    }

    /// True when no request is partially parsed
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Response whose head is parsed but whose body is still arriving
#[derive(Debug)]
struct PendingResponse {
    version: Version,
    status: Status,
    reason: String,
    fields: Fields,
    framing: Framing,
}

/// HTTP response parser
#[derive(Debug, Default)]
pub struct ResponseParser {
    head_request: bool,
    pending: Option<PendingResponse>,
}

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare whether the response answers a HEAD request (and has no body)
    pub fn set_head_request(&mut self, head_request: bool) {
        self.head_request = head_request;
    }

    /// Try to take one complete response off the front of `buf`
    ///
    /// `eof` tells the parser the peer has closed its side: a body without
    /// declared length ends there, and any other unfinished message is an error.
    pub fn parse(&mut self, buf: &mut BytesMut, eof: bool) -> Result<Option<HttpResponse>> {
        let mut pending = match self.pending.take() {
            Some(pending) => pending,
            None => match split_head(buf, MAX_RESPONSE_HEAD_BYTES)? {
                Some((line, fields)) => {
                    let (version, status, reason) = parse_status_line(&line)?;
                    let framing = Framing::for_response(status, &fields, self.head_request)?;
                    PendingResponse {
                        version,
                        status,
                        reason,
                        fields,
                        framing,
                    }
                }
                None if eof && buf.is_empty() => return Err(Error::ConnectionClosed),
                None if eof => return Err(Error::Incomplete),
                None => return Ok(None),
            },
        };

        match pending.framing.poll(buf, eof, usize::MAX)? {
            Some(body) => Ok(Some(
                HttpResponse::builder()
                    .version(pending.version)
                    .status(pending.status)
                    .reason(pending.reason)
                    .fields(pending.fields)
                    .body(body)
                    .build(),
            )),
            None => {
                self.pending = Some(pending);
                Ok(None)
            }
        }
    }
}
