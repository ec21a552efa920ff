use bytes::Bytes;
use gpibnet_frame::GpibAddress;
use gpibnet_transport::BridgeTransport;

use crate::error::Result;
use crate::session::BridgeSession;

/// The three primitives instrument drivers are written against.
pub trait Instrument {
    /// Bus address of the instrument.
    fn address(&self) -> GpibAddress;

    /// Send a command. No response is consumed.
    fn send(&mut self, command: &[u8]) -> Result<()>;

    /// Read one complete response.
    fn read(&mut self) -> Result<Bytes>;

    /// Send a command and read its response.
    fn query(&mut self, command: &[u8]) -> Result<Bytes> {
        self.send(command)?;
        self.read()
    }
}

/// An instrument handle borrowing a [`BridgeSession`].
#[derive(Debug)]
pub struct Device<'a, T: BridgeTransport> {
    session: &'a mut BridgeSession<T>,
    addr: GpibAddress,
}

impl<'a, T: BridgeTransport> Device<'a, T> {
    pub(crate) fn new(session: &'a mut BridgeSession<T>, addr: GpibAddress) -> Self {
        Self { session, addr }
    }
}

impl<T: BridgeTransport> Instrument for Device<'_, T> {
    fn address(&self) -> GpibAddress {
        self.addr
    }

    fn send(&mut self, command: &[u8]) -> Result<()> {
        self.session.send(self.addr, command)
    }

    fn read(&mut self) -> Result<Bytes> {
        self.session.read(self.addr)
    }
}
