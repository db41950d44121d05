//! Handler contract
//!
//! A handler answers one operation per supported HTTP method. Every
//! operation receives the validated request target, the body for methods
//! that carry one, and a [`HeadersAccess`] that builds the request's
//! [`Headers`] only when called.
//!
//! Two flavours exist:
//!
//! - [`Handler`] takes `&self` and must be `Sync`; the server calls it from
//!   every connection thread at once.
//! - [`SerialHandler`] takes `&mut self`. Wrapping it in a
//!   [`ThreadSafeHandler`] turns it into a [`Handler`] whose calls are
//!   serialized by one mutex, for application logic that cannot be entered
//!   concurrently.
//!
//! Every operation defaults to a 404 reply, so an implementation only
//! provides the methods it serves. Handlers report failure through the
//! status of their reply; the dispatcher does not catch panics for them.

use super::Headers;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Deferred accessor for the request headers
pub type HeadersAccess<'a> = &'a dyn Fn() -> Headers;

/// Reply of the OPTIONS, GET, POST and DELETE operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub headers: Option<Headers>,
    pub body: String,
    pub content_type: String,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>, content_type: impl Into<String>) -> Self {
        Reply {
            status,
            headers: None,
            body: body.into(),
            content_type: content_type.into(),
        }
    }

    /// 404 with empty body and content type
    pub fn not_found() -> Self {
        Reply::new(404, "", "")
    }

    /// 500 carrying a plain-text diagnostic
    pub fn error(message: impl Into<String>) -> Self {
        Reply::new(500, message, "text/plain")
    }

    /// Attach extra response headers, replacing any set before
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Add one extra response header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name.into(), value.into());
        self
    }
}

/// Reply of the HEAD operation
///
/// `content_length` is declared as is; no body is ever sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadReply {
    pub status: u16,
    pub headers: Option<Headers>,
    pub content_length: u64,
    pub content_type: String,
}

impl HeadReply {
    pub fn new(status: u16, content_length: u64, content_type: impl Into<String>) -> Self {
        HeadReply {
            status,
            headers: None,
            content_length,
            content_type: content_type.into(),
        }
    }

    pub fn not_found() -> Self {
        HeadReply::new(404, 0, "")
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name.into(), value.into());
        self
    }
}

/// Reply of the PUT operation: a status and optional headers, no payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReply {
    pub status: u16,
    pub headers: Option<Headers>,
}

impl PutReply {
    pub fn new(status: u16) -> Self {
        PutReply {
            status,
            headers: None,
        }
    }

    pub fn not_found() -> Self {
        PutReply::new(404)
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name.into(), value.into());
        self
    }
}

/// Per-method operations called by the dispatcher, shared across threads
pub trait Handler: Send + Sync {
    fn options(&self, _target: &str, _body: &str, _headers: HeadersAccess<'_>) -> Reply {
        Reply::not_found()
    }

    fn head(&self, _target: &str, _headers: HeadersAccess<'_>) -> HeadReply {
        HeadReply::not_found()
    }

    fn get(&self, _target: &str, _headers: HeadersAccess<'_>) -> Reply {
        Reply::not_found()
    }

    fn post(&self, _target: &str, _body: &str, _headers: HeadersAccess<'_>) -> Reply {
        Reply::not_found()
    }

    fn put(&self, _target: &str, _body: &str, _headers: HeadersAccess<'_>) -> PutReply {
        PutReply::not_found()
    }

    fn delete(&self, _target: &str, _body: &str, _headers: HeadersAccess<'_>) -> Reply {
        Reply::not_found()
    }
}

/// Per-method operations that need exclusive access to the handler
///
/// Run behind a [`ThreadSafeHandler`].
pub trait SerialHandler: Send {
    fn options(&mut self, _target: &str, _body: &str, _headers: HeadersAccess<'_>) -> Reply {
        Reply::not_found()
    }

    fn head(&mut self, _target: &str, _headers: HeadersAccess<'_>) -> HeadReply {
        HeadReply::not_found()
    }

    fn get(&mut self, _target: &str, _headers: HeadersAccess<'_>) -> Reply {
        Reply::not_found()
    }

    fn post(&mut self, _target: &str, _body: &str, _headers: HeadersAccess<'_>) -> Reply {
        Reply::not_found()
    }

    fn put(&mut self, _target: &str, _body: &str, _headers: HeadersAccess<'_>) -> PutReply {
        PutReply::not_found()
    }

    fn delete(&mut self, _target: &str, _body: &str, _headers: HeadersAccess<'_>) -> Reply {
        Reply::not_found()
    }
}

/// Serializes every operation of a [`SerialHandler`] behind one mutex
///
/// At most one operation of the wrapped handler runs at a time, across all
/// connections. Only the call into the handler is serialized; socket I/O of
/// other connections proceeds concurrently. The lock is released on every
/// exit path, and a panic inside the handler does not wedge later calls.
#[derive(Debug, Default)]
pub struct ThreadSafeHandler<H> {
    inner: Mutex<H>,
}

impl<H: SerialHandler> ThreadSafeHandler<H> {
    pub fn new(handler: H) -> Self {
        ThreadSafeHandler {
            inner: Mutex::new(handler),
        }
    }

    /// Run `f` with exclusive access to the wrapped handler
    ///
    /// Uses the same lock as the handler operations.
    pub fn with_inner<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    pub fn into_inner(self) -> H {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, H> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H: SerialHandler> Handler for ThreadSafeHandler<H> {
    fn options(&self, target: &str, body: &str, headers: HeadersAccess<'_>) -> Reply {
        self.lock().options(target, body, headers)
    }

    fn head(&self, target: &str, headers: HeadersAccess<'_>) -> HeadReply {
        self.lock().head(target, headers)
    }

    fn get(&self, target: &str, headers: HeadersAccess<'_>) -> Reply {
        self.lock().get(target, headers)
    }

    fn post(&self, target: &str, body: &str, headers: HeadersAccess<'_>) -> Reply {
        self.lock().post(target, body, headers)
    }

    fn put(&self, target: &str, body: &str, headers: HeadersAccess<'_>) -> PutReply {
        self.lock().put(target, body, headers)
    }

    fn delete(&self, target: &str, body: &str, headers: HeadersAccess<'_>) -> Reply {
        self.lock().delete(target, body, headers)
    }
}
