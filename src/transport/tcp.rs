//! TCP endpoint implementation

use super::StreamEndpoint;
use crate::error::{Error, Result};
use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Outbound TCP connection to the downstream consumer
#[derive(Debug)]
pub struct TcpEndpoint {
    stream: TcpStream,
    shut_down: bool,
}

impl TcpEndpoint {
    /// Connect to the consumer.
    ///
    /// # Arguments
    /// * `addr` - Remote address (e.g., "192.0.2.10:1030")
    /// * `timeout` - Connect timeout; `None` blocks until the OS gives up
    pub fn connect(addr: &str, timeout: Option<Duration>) -> Result<Self> {
        let resolved = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Config(format!("remote address {} did not resolve", addr)))?;

        let stream = match timeout {
            Some(t) => TcpStream::connect_timeout(&resolved, t),
            None => TcpStream::connect(resolved),
        }
        .map_err(|e| connection_error(e, addr))?;

        // Rows are small; coalescing them behind Nagle adds latency the
        // consumer notices at bench sample rates
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY: {}", e);
        }

        log::info!("Connected to consumer at {}", addr);
        Ok(Self {
            stream,
            shut_down: false,
        })
    }

    /// Remote address of the underlying socket
    pub fn peer_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}

impl StreamEndpoint for TcpEndpoint {
    fn send(&mut self, chunk: &[u8]) -> Result<()> {
        self.stream
            .write_all(chunk)
            .map_err(|e| connection_error(e, "peer"))
    }

    fn flush(&mut self) -> Result<()> {
        self.stream
            .flush()
            .map_err(|e| connection_error(e, "peer"))
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already closed by the peer counts as shut down
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Map socket errors that mean "the peer is gone" to `ConnectionLost`
fn connection_error(e: std::io::Error, peer: &str) -> Error {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionRefused
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof
        | ErrorKind::WriteZero
        | ErrorKind::TimedOut => Error::ConnectionLost(format!("{}: {}", peer, e)),
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn test_send_reaches_consumer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).unwrap();
            buf
        });

        let mut endpoint =
            TcpEndpoint::connect(&addr, Some(Duration::from_secs(1))).unwrap();
        endpoint.send(b"abc").unwrap();
        endpoint.send(b"def").unwrap();
        endpoint.shutdown().unwrap();
        endpoint.shutdown().unwrap(); // idempotent

        assert_eq!(server.join().unwrap(), b"abcdef");
    }

    #[test]
    fn test_connect_refused_is_connection_lost() {
        // Bind-then-drop to find a port nothing listens on
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let err = TcpEndpoint::connect(
            &format!("127.0.0.1:{}", port),
            Some(Duration::from_millis(500)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(_) | Error::Io(_)));
    }
}
