//! Request dispatcher
//!
//! Validates a parsed request, calls the matching [`Handler`] operation and
//! assembles the wire response. Invalid requests are answered here and never
//! reach the handler.

use super::headers::is_token_byte;
use super::{
    Error, Handler, HeadReply, Headers, HttpRequest, HttpResponse, Method, PutReply, Reply,
    Status,
};
use tracing::debug;

/// Header fields whose values are owned by the transport
const FRAMING_FIELDS: [&str; 3] = ["Content-Length", "Transfer-Encoding", "Connection"];

/// Defaults set by the dispatcher that a handler may clear with an empty value
const DEFAULT_FIELDS: [&str; 2] = ["Content-Type", "Server"];

/// Check that a request target is an absolute path without `..`
pub fn is_safe_target(target: &str) -> bool {
    target.starts_with('/') && !target.contains("..")
}

/// Produce the response for one request
///
/// `server` is the value of the `Server` header on every response.
pub fn dispatch(handler: &dyn Handler, request: &HttpRequest, server: &str) -> HttpResponse {
    let response = Responder { request, server };

    if !request.method().is_dispatchable() {
        return response.bad_request("Unknown HTTP-method");
    }

    if !is_safe_target(request.target()) {
        return response.bad_request("Illegal request-target");
    }

    let target = request.target();
    let body = String::from_utf8_lossy(request.body());
    let get_headers = || request.fields().to_headers();

    match request.method() {
        Method::Options => response.send_body(handler.options(target, &body, &get_headers)),
        Method::Head => response.send_empty(handler.head(target, &get_headers)),
        Method::Get => response.send_body(handler.get(target, &get_headers)),
        Method::Post => response.send_body(handler.post(target, &body, &get_headers)),
        Method::Put => response.send_no_content(handler.put(target, &body, &get_headers)),
        Method::Delete => response.send_body(handler.delete(target, &body, &get_headers)),
        _ => response.server_error("not implemented."),
    }
}

/// Response to a request that could not be parsed
///
/// Always closes the connection: after a framing error the rest of the
/// byte stream cannot be trusted.
pub fn reject(error: &Error, server: &str) -> HttpResponse {
    let mut response = HttpResponse::builder().status(error.status()).build();
    response.fields_mut().set("Server", server);
    response.fields_mut().set("Content-Type", "text/html");
    set_payload(&mut response, error.to_string().into_bytes());
    response.set_keep_alive(false);
    response
}

/// Builds responses that mirror the request's version and keep-alive preference
struct Responder<'a> {
    request: &'a HttpRequest,
    server: &'a str,
}

impl Responder<'_> {
    fn start(&self, status: Status) -> HttpResponse {
        let mut response = HttpResponse::builder()
            .version(self.request.version())
            .status(status)
            .build();
        response.fields_mut().set("Server", self.server);
        response
    }

    fn finish(&self, mut response: HttpResponse) -> HttpResponse {
        response.set_keep_alive(self.request.keep_alive());
        response
    }

    fn status(&self, code: u16) -> Result<Status, HttpResponse> {
        Status::new(code).map_err(|_| {
            self.server_error(&format!("invalid status code {} from handler", code))
        })
    }

    fn html(&self, status: Status, body: String) -> HttpResponse {
        let mut response = self.start(status);
        response.fields_mut().set("Content-Type", "text/html");
        set_payload(&mut response, body.into_bytes());
        self.finish(response)
    }

    fn bad_request(&self, why: &str) -> HttpResponse {
        self.html(Status::BAD_REQUEST, why.to_string())
    }

    fn server_error(&self, what: &str) -> HttpResponse {
        self.html(
            Status::INTERNAL_SERVER_ERROR,
            format!("An error occurred: '{}'", what),
        )
    }

    /// OPTIONS, GET, POST and DELETE: the reply body is the payload
    fn send_body(&self, reply: Reply) -> HttpResponse {
        let status = match self.status(reply.status) {
            Ok(status) => status,
            Err(response) => return response,
        };

        let mut response = self.start(status);
        set_content_type(&mut response, reply.content_type);
        set_payload(&mut response, reply.body.into_bytes());
        apply_extra_headers(&mut response, reply.headers);
        self.finish(response)
    }

    /// HEAD: declared length from the handler, no payload
    fn send_empty(&self, reply: HeadReply) -> HttpResponse {
        let status = match self.status(reply.status) {
            Ok(status) => status,
            Err(response) => return response,
        };

        let mut response = self.start(status);
        set_content_type(&mut response, reply.content_type);
        if status.allows_content_length() {
            response
                .fields_mut()
                .set("Content-Length", reply.content_length.to_string());
        }
        apply_extra_headers(&mut response, reply.headers);
        self.finish(response)
    }

    /// PUT: status and extra headers only
    fn send_no_content(&self, reply: PutReply) -> HttpResponse {
        let status = match self.status(reply.status) {
            Ok(status) => status,
            Err(response) => return response,
        };

        let mut response = self.start(status);
        set_payload(&mut response, Vec::new());
        apply_extra_headers(&mut response, reply.headers);
        self.finish(response)
    }
}

fn set_content_type(response: &mut HttpResponse, content_type: String) {
    if !content_type.is_empty() {
        response.fields_mut().set("Content-Type", content_type);
    }
}

/// Attach `body` and declare its length, as far as the status permits
fn set_payload(response: &mut HttpResponse, body: Vec<u8>) {
    let status = response.status();
    if status.allows_content_length() {
        response
            .fields_mut()
            .set("Content-Length", body.len().to_string());
    }
    if status.allows_body() {
        response.set_body(body);
    }
}

fn is_one_of(name: &str, fields: &[&str]) -> bool {
    fields.iter().any(|f| f.eq_ignore_ascii_case(name))
}

/// Whether a handler-supplied field can be written to the wire as is
fn is_valid_field(name: &str, value: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(is_token_byte)
        && !value.bytes().any(|b| b == b'\r' || b == b'\n')
}

/// Write handler-supplied headers over the defaults
///
/// Framing fields stay under the transport's control. An empty value clears
/// a default field and is sent as an empty field otherwise.
fn apply_extra_headers(response: &mut HttpResponse, headers: Option<Headers>) {
    let Some(headers) = headers else {
        return;
    };

    for (name, value) in headers {
        if is_one_of(&name, &FRAMING_FIELDS) {
            debug!(header = %name, "ignoring framing header from handler");
            continue;
        }
        if !is_valid_field(&name, &value) {
            debug!(header = ?name, value = ?value, "ignoring malformed header from handler");
            continue;
        }
        if value.is_empty() && is_one_of(&name, &DEFAULT_FIELDS) {
            response.fields_mut().remove(&name);
        } else {
            response.fields_mut().set(name, value);
        }
    }
}
