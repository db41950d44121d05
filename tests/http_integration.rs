//! Integration tests for the HTTP layer
//!
//! These tests run a real server on an ephemeral port and talk to it with
//! the client call, the connection-level client and raw sockets.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use verbhttp::http::{
    Handler, HeadReply, Headers, HeadersAccess, HttpClient, HttpRequest, Method, PutReply,
    Reply, SerialHandler, Server, ServerConfig, ThreadSafeHandler,
};
use verbhttp::{http_client, ClientResponse};

/// Small application used by most tests
#[derive(Default)]
struct Store {
    calls: AtomicUsize,
}

impl Handler for Store {
    fn options(&self, _target: &str, _body: &str, _headers: HeadersAccess<'_>) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Reply::new(200, "", "").with_header("Allow", "OPTIONS, HEAD, GET, POST, PUT, DELETE")
    }

    fn head(&self, target: &str, _headers: HeadersAccess<'_>) -> HeadReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match target {
            "/big" => HeadReply::new(200, 12345, "application/octet-stream"),
            _ => HeadReply::not_found(),
        }
    }

    fn get(&self, target: &str, headers: HeadersAccess<'_>) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match target {
            "/hello" => Reply::new(200, "hello world", "text/plain"),
            "/extra" => Reply::new(200, "{\"ok\":true}", "application/json")
                .with_header("X-A", "1")
                .with_header("X-B", "2"),
            "/blank" => Reply::new(200, "x", "text/plain").with_header("X-Empty", ""),
            "/whoami" => {
                let agent = headers().get("User-Agent").cloned().unwrap_or_default();
                Reply::new(200, agent, "text/plain")
            }
            _ => Reply::not_found(),
        }
    }

    fn post(&self, _target: &str, body: &str, _headers: HeadersAccess<'_>) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Reply::new(200, body.chars().rev().collect::<String>(), "text/plain")
    }

    fn put(&self, target: &str, _body: &str, _headers: HeadersAccess<'_>) -> PutReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match target {
            "/item" => PutReply::new(201).with_header("X-Id", "42"),
            _ => PutReply::new(204),
        }
    }

    fn delete(&self, target: &str, _body: &str, _headers: HeadersAccess<'_>) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Reply::error(format!("{} is read-only", target))
    }
}

fn start(handler: Arc<dyn Handler>, max_connections: usize) -> SocketAddr {
    let config = ServerConfig::new("127.0.0.1", 0)
        .unwrap()
        .with_max_connections(max_connections);
    let server = Server::bind(config, handler).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.serve());
    addr
}

fn start_store() -> (SocketAddr, Arc<Store>) {
    let store = Arc::new(Store::default());
    let addr = start(store.clone(), 0);
    (addr, store)
}

fn call(addr: SocketAddr, method: &str, target: &str, body: &str) -> ClientResponse {
    http_client(method, "127.0.0.1", addr.port(), target, None, body)
}

/// Send raw bytes on a fresh connection and read until the server closes
fn raw_exchange(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(request).unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[test]
fn test_get_hello() {
    let (addr, _) = start_store();
    let response = call(addr, "get", "/hello", "");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "hello world");
    assert_eq!(response.headers["Content-Type"], "text/plain");
    assert_eq!(response.headers["Content-Length"], "11");
    assert!(response.headers["Server"].starts_with("verbhttp/"));
}

#[test]
fn test_round_trip_preserves_handler_reply() {
    let (addr, _) = start_store();
    let response = call(addr, "GET", "/extra", "");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "{\"ok\":true}");
    assert_eq!(response.headers["Content-Type"], "application/json");
    assert_eq!(response.headers["X-A"], "1");
    assert_eq!(response.headers["X-B"], "2");
}

#[test]
fn test_round_trip_keeps_empty_header() {
    let (addr, _) = start_store();
    let response = call(addr, "GET", "/blank", "");

    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("X-Empty").map(String::as_str), Some(""));
    assert_eq!(response.headers["Content-Type"], "text/plain");
}

#[test]
fn test_put_item() {
    let (addr, _) = start_store();
    let response = call(addr, "put", "/item", "payload");

    assert_eq!(response.status, 201);
    assert_eq!(response.headers["X-Id"], "42");
    assert!(response.body.is_empty());
    assert!(!response.headers.contains_key("Content-Type"));
}

#[test]
fn test_head_declares_length() {
    let (addr, _) = start_store();
    let response = call(addr, "head", "/big", "");

    assert_eq!(response.status, 200);
    assert_eq!(response.headers["Content-Length"], "12345");
    assert!(response.body.is_empty());
}

#[test]
fn test_post_delete_options() {
    let (addr, _) = start_store();

    let response = call(addr, "post", "/rev", "abc");
    assert_eq!((response.status, response.body.as_str()), (200, "cba"));

    let response = call(addr, "delete", "/x", "");
    assert_eq!(response.status, 500);
    assert_eq!(response.body, "/x is read-only");

    let response = call(addr, "options", "/", "");
    assert_eq!(response.status, 200);
    assert!(response.headers["Allow"].contains("DELETE"));
}

#[test]
fn test_unknown_target_is_404() {
    let (addr, _) = start_store();
    let response = call(addr, "get", "/missing", "");
    assert_eq!(response.status, 404);
    assert!(response.body.is_empty());
}

#[test]
fn test_handler_sees_request_headers() {
    let (addr, _) = start_store();
    let headers = Headers::from([("User-Agent".to_string(), "tester/2".to_string())]);

    let response = http_client("get", "127.0.0.1", addr.port(), "/whoami", Some(&headers), "");
    assert_eq!(response.body, "tester/2");
}

#[test]
fn test_path_traversal_rejected() {
    let (addr, store) = start_store();
    let response = call(addr, "get", "/../etc/passwd", "");

    assert_eq!(response.status, 400);
    assert_eq!(response.body, "Illegal request-target");
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unknown_method_rejected() {
    let (addr, store) = start_store();
    let response = raw_exchange(
        addr,
        b"PATCH /hello HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
    );

    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(response.ends_with("Unknown HTTP-method"));
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_malformed_request_closes_connection() {
    let (addr, _) = start_store();
    let response = raw_exchange(addr, b"garbage\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(response.contains("Connection: close\r\n"));
}

#[test]
fn test_keep_alive_serves_sequential_requests() {
    let (addr, store) = start_store();
    let mut client = HttpClient::new(TcpStream::connect(addr).unwrap());

    for target in ["/hello", "/extra", "/hello"] {
        let request = HttpRequest::builder()
            .method(Method::Get)
            .target(target)
            .header("Host", "localhost")
            .build();
        let response = client.exchange(&request).unwrap();
        assert_eq!(response.status().code(), 200);
        assert!(!response.fields().contains("Connection"));
    }

    let put = HttpRequest::builder()
        .method(Method::Put)
        .target("/item")
        .header("Host", "localhost")
        .build();
    assert_eq!(client.exchange(&put).unwrap().status().code(), 201);

    client.close().unwrap();
    assert_eq!(store.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_pipelined_requests() {
    let (addr, _) = start_store();
    let response = raw_exchange(
        addr,
        b"GET /hello HTTP/1.1\r\n\r\nPOST /r HTTP/1.1\r\nContent-Length: 2\r\n\r\nxy\
          GET /hello HTTP/1.1\r\nConnection: close\r\n\r\n",
    );

    assert_eq!(response.matches("HTTP/1.1 200 OK\r\n").count(), 3);
    let first = response.find("hello world").unwrap();
    let second = response.find("yx").unwrap();
    assert!(first < second);
    assert!(response.ends_with("hello world"));
}

#[test]
fn test_http10_request_gets_http10_response() {
    let (addr, _) = start_store();
    let response = raw_exchange(addr, b"GET /hello HTTP/1.0\r\n\r\n");

    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.ends_with("hello world"));
}

/// Appends to its log without any locking of its own
struct Journal {
    log: Vec<String>,
}

impl SerialHandler for Journal {
    fn get(&mut self, target: &str, _headers: HeadersAccess<'_>) -> Reply {
        self.log.push(format!("enter {}", target));
        thread::sleep(Duration::from_millis(1));
        self.log.push(format!("leave {}", target));
        Reply::new(200, target, "text/plain")
    }
}

#[test]
fn test_wrapped_handler_calls_never_interleave() {
    let journal = Arc::new(ThreadSafeHandler::new(Journal { log: Vec::new() }));
    let addr = start(journal.clone(), 0);

    let clients: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                for j in 0..5 {
                    let target = format!("/c{}/r{}", i, j);
                    let response = call(addr, "get", &target, "");
                    assert_eq!(response.status, 200);
                    assert_eq!(response.body, target);
                }
            })
        })
        .collect();
    for client in clients {
        client.join().unwrap();
    }

    let log = journal.with_inner(|journal| journal.log.clone());
    assert_eq!(log.len(), 80);
    for pair in log.chunks(2) {
        let target = pair[0].strip_prefix("enter ").unwrap();
        assert_eq!(pair[1], format!("leave {}", target));
    }
}

#[test]
fn test_max_connections_pauses_accept() {
    let addr = start(Arc::new(Store::default()), 1);

    let mut first = HttpClient::new(TcpStream::connect(addr).unwrap());
    let hello = HttpRequest::builder().target("/hello").header("Host", "x").build();
    assert_eq!(first.exchange(&hello).unwrap().status().code(), 200);

    let answered = Arc::new(Mutex::new(None));
    let second = {
        let answered = Arc::clone(&answered);
        thread::spawn(move || {
            let response = call(addr, "get", "/hello", "");
            *answered.lock().unwrap() = Some(response.status);
        })
    };

    thread::sleep(Duration::from_millis(200));
    assert_eq!(*answered.lock().unwrap(), None);

    first.close().unwrap();
    drop(first);
    second.join().unwrap();
    assert_eq!(*answered.lock().unwrap(), Some(200));
}

#[test]
fn test_unreachable_host() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let response = http_client("get", "127.0.0.1", port, "/", None, "");
    assert_eq!(response.status, 500);
    assert!(response.headers.is_empty());
    assert!(!response.body.is_empty());
}

#[test]
fn test_run_reports_startup_failure() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    assert!(verbhttp::run("127.0.0.1", port, Arc::new(Store::default()), 4).is_err());
    assert!(verbhttp::run("no-such-address", 8080, Arc::new(Store::default()), 4).is_err());
}
