//! Minimal server with a stateful handler
//!
//! Run with: cargo run --example hello_server -- [address] [port] [max_connections]
//! Log level is taken from RUST_LOG (default: info).

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use verbhttp::http::{HeadReply, HeadersAccess, PutReply, Reply, SerialHandler, ThreadSafeHandler};

/// Keeps one text document per path
#[derive(Default)]
struct Notes {
    notes: std::collections::HashMap<String, String>,
}

impl SerialHandler for Notes {
    fn options(&mut self, _target: &str, _body: &str, _headers: HeadersAccess<'_>) -> Reply {
        Reply::new(200, "", "").with_header("Allow", "OPTIONS, HEAD, GET, PUT, DELETE")
    }

    fn head(&mut self, target: &str, _headers: HeadersAccess<'_>) -> HeadReply {
        match self.notes.get(target) {
            Some(note) => HeadReply::new(200, note.len() as u64, "text/plain"),
            None => HeadReply::not_found(),
        }
    }

    fn get(&mut self, target: &str, _headers: HeadersAccess<'_>) -> Reply {
        match self.notes.get(target) {
            Some(note) => Reply::new(200, note.clone(), "text/plain"),
            None => Reply::not_found(),
        }
    }

    fn put(&mut self, target: &str, body: &str, _headers: HeadersAccess<'_>) -> PutReply {
        let status = match self.notes.insert(target.to_string(), body.to_string()) {
            Some(_) => 204,
            None => 201,
        };
        PutReply::new(status)
    }

    fn delete(&mut self, target: &str, _body: &str, _headers: HeadersAccess<'_>) -> Reply {
        match self.notes.remove(target) {
            Some(note) => Reply::new(200, note, "text/plain"),
            None => Reply::not_found(),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.next().and_then(|p| p.parse().ok()).unwrap_or(8080);
    let max_connections = args.next().and_then(|n| n.parse().ok()).unwrap_or(64);

    let handler = Arc::new(ThreadSafeHandler::new(Notes::default()));
    match verbhttp::run(&address, port, handler, max_connections) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
