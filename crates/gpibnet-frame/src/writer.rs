use bytes::BytesMut;
use gpibnet_transport::BridgeTransport;
use tracing::debug;

use crate::codec::encode_command;
use crate::directive::Directive;
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Encodes commands and directives into a reused buffer and writes them to a
/// bridge transport.
#[derive(Debug)]
pub struct CommandWriter {
    buf: BytesMut,
}

impl CommandWriter {
    /// Create a writer with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Escape, terminate and send an instrument command.
    ///
    /// Returns the exact bytes written.
    pub fn send_command<T: BridgeTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        command: &[u8],
    ) -> Result<&[u8]> {
        self.buf.clear();
        encode_command(command, &mut self.buf);
        transport.send(&self.buf)?;
        Ok(&self.buf[..])
    }

    /// Send a bridge directive.
    ///
    /// Returns the exact bytes written.
    pub fn send_directive<T: BridgeTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        directive: &Directive,
    ) -> Result<&[u8]> {
        self.buf.clear();
        directive.encode(&mut self.buf);
        debug!(name = directive.name(), directive = %directive, "sending bridge directive");
        transport.send(&self.buf)?;
        Ok(&self.buf[..])
    }
}

impl Default for CommandWriter {
    fn default() -> Self {
        Self::new()
    }
}
