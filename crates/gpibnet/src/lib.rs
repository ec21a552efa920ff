//! Talk to GPIB (IEEE-488) instruments through an Ethernet-to-GPIB bridge.
//!
//! gpibnet multiplexes every instrument on a GPIB bus over one TCP
//! connection to a Prologix-style bridge, and recovers response boundaries
//! from the bridge's injected end-of-transmission byte.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-stream transport to the bridge (TCP, scripted mock)
//! - [`frame`]: Command escaping, bridge directives, response decoding
//! - [`bridge`]: Sessions, device handles, diagnostic logging (behind `bridge` feature)

/// Re-export transport types.
pub mod transport {
    pub use gpibnet_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gpibnet_frame::*;
}

/// Re-export bridge types (requires `bridge` feature).
#[cfg(feature = "bridge")]
pub mod bridge {
    pub use gpibnet_bridge::*;
}
