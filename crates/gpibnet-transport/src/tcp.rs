use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::BridgeTransport;

/// Default TCP port of Prologix-style GPIB-Ethernet bridges.
pub const DEFAULT_PORT: u16 = 1234;

/// TCP transport to a GPIB-Ethernet bridge.
///
/// Wraps a connected [`TcpStream`] with Nagle disabled, since bridge traffic is
/// dominated by short directive lines. The receive timeout starts at
/// [`TcpTransport::INITIAL_TIMEOUT`] until the session configures its own.
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    timeout: Duration,
}

impl TcpTransport {
    /// Receive timeout applied right after connecting.
    pub const INITIAL_TIMEOUT: Duration = Duration::from_secs(1);

    /// Connect to a bridge (blocking, OS connect timeout).
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect((host, port)).map_err(|e| TransportError::Connect {
            addr: addr.clone(),
            source: e,
        })?;
        info!(%addr, "connected to bridge");
        Self::from_stream(stream)
    }

    /// Connect to a bridge, giving up on each resolved address after `timeout`.
    pub fn connect_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let candidates = (host, port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect {
                addr: addr.clone(),
                source: e,
            })?;

        let mut last_err = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    info!(%addr, resolved = %candidate, "connected to bridge");
                    return Self::from_stream(stream);
                }
                Err(e) => {
                    debug!(%candidate, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(TransportError::Connect {
            addr,
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(ErrorKind::NotFound, "host resolved to no addresses")
            }),
        })
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(Self::INITIAL_TIMEOUT))?;
        Ok(Self {
            stream,
            peer,
            timeout: Self::INITIAL_TIMEOUT,
        })
    }

    /// Address of the connected bridge.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl BridgeTransport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        self.stream.flush()?;
        Ok(())
    }

    fn recv_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(_) => return Ok(byte[0]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                // Unix reports an expired SO_RCVTIMEO as WouldBlock, Windows as TimedOut.
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Err(TransportError::Timeout(self.timeout))
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(TransportError::InvalidTimeout(timeout));
        }
        if timeout != self.timeout {
            self.stream.set_read_timeout(Some(timeout))?;
            self.timeout = timeout;
        }
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.peer)
            .field("timeout", &self.timeout)
            .finish()
    }
}
