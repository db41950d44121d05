//! Transport abstraction
//!
//! Sessions and clients talk to a [`Transport`] rather than a concrete
//! socket, so the connection state machine can be driven by a `TcpStream`
//! in production and by an in-memory stream in tests.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

/// Byte stream with TCP-style half-close
pub trait Transport: Read + Write {
    /// Shut down the read, write, or both halves of the connection
    fn shutdown(&self, how: Shutdown) -> io::Result<()>;

    /// Address of the remote peer, when known
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl Transport for TcpStream {
    fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        TcpStream::shutdown(self, how)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }
}

/// Errors that only mean the peer went away and are not worth reporting
pub fn is_benign(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
    )
}

/// Shut down `how`, treating an already-disconnected socket as success
pub fn shutdown_quietly<T: Transport + ?Sized>(transport: &T, how: Shutdown) -> io::Result<()> {
    match transport.shutdown(how) {
        Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_benign_errors() {
        assert!(is_benign(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(is_benign(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_benign(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[test]
    fn test_tcp_half_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"Hello").unwrap();
            Transport::shutdown(&stream, Shutdown::Write).unwrap();
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        assert!(Transport::peer_addr(&stream).is_some());

        let mut received = Vec::new();
        stream.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"Hello");

        handle.join().unwrap();
        shutdown_quietly(&stream, Shutdown::Both).unwrap();
    }
}
