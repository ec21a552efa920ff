//! Bridge session management for GPIB-Ethernet bridges.
//!
//! This is the "just works" layer. Connect to a bridge, then send commands
//! to and read responses from any instrument on the bus, through a session
//! or through per-instrument handles.
//!
//! ```no_run
//! use gpibnet_bridge::{connect, Instrument};
//! use gpibnet_frame::GpibAddress;
//!
//! let mut session = connect("10.30.42.1", 1234)?;
//! let mut psu = session.device(GpibAddress::new(5)?);
//! let idn = psu.query(b"*IDN?")?;
//! println!("{}", String::from_utf8_lossy(&idn));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cancel;
pub mod commlog;
pub mod config;
pub mod connector;
pub mod device;
pub mod error;
pub mod session;
pub mod shared;

pub use cancel::CancelToken;
pub use commlog::{
    CommLog, CommRecord, FileCommLog, MemoryCommLog, NullCommLog, TracingCommLog, COMM_TARGET,
};
pub use config::{BridgeConfig, DEFAULT_EOT_CHAR, DEFAULT_EOT_TIMEOUT, DEFAULT_READ_TIMEOUT};
pub use connector::{connect, connect_with_config};
pub use device::{Device, Instrument};
pub use error::{BridgeError, Result};
pub use session::{BridgeSession, BRIDGE_REPLY_ATTEMPTS};
pub use shared::{SharedDevice, SharedSession};
