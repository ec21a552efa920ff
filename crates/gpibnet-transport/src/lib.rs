//! Byte-stream transport to an Ethernet-to-GPIB bridge.
//!
//! Provides the narrow interface the bridge session needs:
//! - send a buffer
//! - receive exactly one byte, bounded by a receive timeout
//! - change the receive timeout
//!
//! This is the lowest layer of gpibnet. No message framing is assumed here;
//! everything else builds on top of the [`BridgeTransport`] trait.

pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{Result, TransportError};
pub use tcp::{TcpTransport, DEFAULT_PORT};
pub use traits::BridgeTransport;

#[cfg(any(test, feature = "mock"))]
pub use mock::{ScriptStep, ScriptedTransport};
