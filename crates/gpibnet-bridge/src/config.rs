use std::time::Duration;

use gpibnet_frame::EosMode;

use crate::error::{BridgeError, Result};

/// Default receive timeout while waiting for response data.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Default silence after an EOT byte that confirms end of transmission.
pub const DEFAULT_EOT_TIMEOUT: Duration = Duration::from_millis(10);
/// Default EOT byte (`{`).
pub const DEFAULT_EOT_CHAR: u8 = 123;

/// Bridge session configuration.
///
/// The bridge options (`eos`, `eot_char`) are sent once when the session
/// starts and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Receive timeout while awaiting response data. A read directive is
    /// re-issued every time it expires.
    pub read_timeout: Duration,
    /// Receive timeout after an EOT byte. Silence for this long means the
    /// byte was the real terminator; it must be shorter than `read_timeout`
    /// and longer than the gap between bytes of one bridge burst.
    pub eot_timeout: Duration,
    /// Byte the bridge appends when the instrument asserts EOI.
    pub eot_char: u8,
    /// Terminator the bridge appends to forwarded commands.
    pub eos: EosMode,
    /// TCP connect timeout. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Give up a read after this many unanswered read directives.
    /// `None` waits forever.
    pub max_read_attempts: Option<u32>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            eot_timeout: DEFAULT_EOT_TIMEOUT,
            eot_char: DEFAULT_EOT_CHAR,
            eos: EosMode::Lf,
            connect_timeout: None,
            max_read_attempts: None,
        }
    }
}

impl BridgeConfig {
    /// Check the timing knobs are consistent.
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout.is_zero() {
            return Err(BridgeError::InvalidConfig(
                "read_timeout must be non-zero".to_string(),
            ));
        }
        if self.eot_timeout.is_zero() {
            return Err(BridgeError::InvalidConfig(
                "eot_timeout must be non-zero".to_string(),
            ));
        }
        if self.eot_timeout >= self.read_timeout {
            return Err(BridgeError::InvalidConfig(format!(
                "eot_timeout ({:?}) must be shorter than read_timeout ({:?})",
                self.eot_timeout, self.read_timeout
            )));
        }
        if self.connect_timeout.is_some_and(|t| t.is_zero()) {
            return Err(BridgeError::InvalidConfig(
                "connect_timeout must be non-zero".to_string(),
            ));
        }
        if self.max_read_attempts == Some(0) {
            return Err(BridgeError::InvalidConfig(
                "max_read_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
