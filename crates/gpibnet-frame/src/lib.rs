//! Command framing and response boundary detection for GPIB-Ethernet bridges.
//!
//! This is the core value-add layer of gpibnet:
//! - Instrument commands are escaped so the bridge's line parser passes
//!   LF, CR, ESC and `+` through verbatim, then terminated with LF
//! - Bridge directives (`++addr`, `++read eoi`, ...) are encoded unescaped
//! - Responses are delimited by an injected EOT byte, disambiguated from
//!   identical payload bytes by a short follow-up timeout
//!
//! Everything here is transport-agnostic apart from [`CommandWriter`], which
//! writes through any [`gpibnet_transport::BridgeTransport`].

pub mod address;
pub mod codec;
pub mod directive;
pub mod error;
pub mod reader;
pub mod writer;

pub use address::{GpibAddress, MAX_ADDRESS};
pub use codec::{encode_command, escape_command, unescape_command, CR, ESC, LF, PLUS, RESERVED};
pub use directive::{startup_sequence, Directive, EosMode};
pub use error::{FrameError, Result};
pub use reader::{DecodeState, ReadStats, ResponseDecoder, Step, Termination};
pub use writer::CommandWriter;
