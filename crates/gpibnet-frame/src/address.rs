//! GPIB bus addresses.
//!
//! Primary addresses 0-30 identify one instrument each on the shared bus.
//! Address 31 is the bus "untalk/unlisten" code and is never assignable.

use std::fmt;

use crate::error::{FrameError, Result};

/// Highest assignable primary address.
pub const MAX_ADDRESS: u8 = 30;

/// A validated GPIB primary address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpibAddress(u8);

impl GpibAddress {
    /// Validate and wrap a primary address.
    pub fn new(addr: u8) -> Result<Self> {
        if addr > MAX_ADDRESS {
            return Err(FrameError::InvalidAddress(addr));
        }
        Ok(Self(addr))
    }

    /// The raw address value.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for GpibAddress {
    type Error = FrameError;

    fn try_from(addr: u8) -> Result<Self> {
        Self::new(addr)
    }
}

impl From<GpibAddress> for u8 {
    fn from(addr: GpibAddress) -> u8 {
        addr.0
    }
}

impl fmt::Display for GpibAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GpibAddress {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let raw: u8 = s
            .trim()
            .parse()
            .map_err(|_| format!("not a GPIB address: {s:?}"))?;
        Self::new(raw).map_err(|e| e.to_string())
    }
}
