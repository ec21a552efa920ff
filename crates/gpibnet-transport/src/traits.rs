use std::time::Duration;

use crate::error::Result;

/// A duplex byte stream to the bridge.
///
/// Implementations carry raw bytes only. The receive side is strictly
/// single-byte so the caller can inspect every byte as it arrives and change
/// the timeout between bytes.
pub trait BridgeTransport {
    /// Write the whole buffer to the bridge.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive one byte.
    ///
    /// Returns `Err(TransportError::Timeout)` if nothing arrives within the
    /// current timeout and `Err(TransportError::Closed)` at end of stream.
    fn recv_byte(&mut self) -> Result<u8>;

    /// Set the receive timeout used by subsequent [`recv_byte`](Self::recv_byte) calls.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Current receive timeout.
    fn timeout(&self) -> Duration;
}

impl<T: BridgeTransport + ?Sized> BridgeTransport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data)
    }

    fn recv_byte(&mut self) -> Result<u8> {
        (**self).recv_byte()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_timeout(timeout)
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }
}
