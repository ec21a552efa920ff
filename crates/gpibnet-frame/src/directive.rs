//! Bridge directives.
//!
//! Lines starting with `++` configure or command the bridge itself and are
//! never forwarded to an instrument. They are sent unescaped.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::address::GpibAddress;

/// Directive prefix.
pub const DIRECTIVE_PREFIX: &[u8] = b"++";

/// Terminator characters the bridge appends to commands it forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EosMode {
    /// Append CR LF.
    CrLf,
    /// Append CR.
    Cr,
    /// Append LF.
    #[default]
    Lf,
    /// Append nothing.
    None,
}

impl EosMode {
    /// Numeric code used by `++eos`.
    pub fn code(self) -> u8 {
        match self {
            EosMode::CrLf => 0,
            EosMode::Cr => 1,
            EosMode::Lf => 2,
            EosMode::None => 3,
        }
    }
}

/// A bridge-level directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `++auto`: read back automatically after every command when enabled.
    Auto(bool),
    /// `++eos`: terminator appended to forwarded commands.
    Eos(EosMode),
    /// `++eot_enable`: append the EOT byte when EOI is seen.
    EotEnable(bool),
    /// `++eot_char`: the EOT byte value.
    EotChar(u8),
    /// `++addr`: select the addressed instrument.
    Addr(GpibAddress),
    /// `++read eoi`: relay one response, up to EOI.
    ReadEoi,
    /// `++ver`: report bridge firmware version.
    Ver,
}

impl Directive {
    /// Encode the directive into `dst`, LF terminated.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(DIRECTIVE_PREFIX);
        dst.put_slice(self.to_string().as_bytes());
        dst.put_u8(crate::codec::LF);
    }

    /// Encode the directive into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Directive::Auto(_) => "auto",
            Directive::Eos(_) => "eos",
            Directive::EotEnable(_) => "eot_enable",
            Directive::EotChar(_) => "eot_char",
            Directive::Addr(_) => "addr",
            Directive::ReadEoi => "read",
            Directive::Ver => "ver",
        }
    }
}

/// Formats the directive body without the `++` prefix.
impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Auto(on) => write!(f, "auto {}", u8::from(*on)),
            Directive::Eos(mode) => write!(f, "eos {}", mode.code()),
            Directive::EotEnable(on) => write!(f, "eot_enable {}", u8::from(*on)),
            Directive::EotChar(ch) => write!(f, "eot_char {ch}"),
            Directive::Addr(addr) => write!(f, "addr {addr}"),
            Directive::ReadEoi => f.write_str("read eoi"),
            Directive::Ver => f.write_str("ver"),
        }
    }
}

/// Startup directives, in the order they must be sent.
pub fn startup_sequence(eos: EosMode, eot_char: u8) -> [Directive; 4] {
    [
        Directive::Auto(false),
        Directive::Eos(eos),
        Directive::EotEnable(true),
        Directive::EotChar(eot_char),
    ]
}
