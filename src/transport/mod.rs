//! Transport layer for the outbound byte stream

use crate::error::Result;

mod tcp;
pub use tcp::TcpEndpoint;

pub mod mock;
pub use mock::MockEndpoint;

/// Ordered, reliable byte-stream endpoint to the downstream consumer.
///
/// One endpoint per session: connected at bootstrap, written to
/// repeatedly, shut down exactly once at teardown. "Sent" means accepted
/// by the transport layer's own flow control; there is no application
/// acknowledgment.
pub trait StreamEndpoint: Send {
    /// Write one chunk completely, in order.
    ///
    /// A closed or broken connection surfaces as
    /// [`Error::ConnectionLost`](crate::error::Error::ConnectionLost),
    /// which is fatal to the session.
    fn send(&mut self, chunk: &[u8]) -> Result<()>;

    /// Flush pending writes (blocking until handed to the OS)
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Close the connection. Must be idempotent.
    fn shutdown(&mut self) -> Result<()>;
}
