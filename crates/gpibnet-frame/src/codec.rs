use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Line feed: terminates every line the bridge parses.
pub const LF: u8 = 0x0A;
/// Carriage return.
pub const CR: u8 = 0x0D;
/// Escape prefix.
pub const ESC: u8 = 0x1B;
/// Plus sign: a leading `++` marks a bridge directive.
pub const PLUS: u8 = 0x2B;

/// Bytes the bridge's line parser treats specially inside a command.
pub const RESERVED: [u8; 4] = [LF, CR, ESC, PLUS];

/// Returns true if `byte` must be escaped inside a command.
pub fn is_reserved(byte: u8) -> bool {
    RESERVED.contains(&byte)
}

/// Escape a raw instrument command and append it to `dst`, terminated.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────────────────┬──────┐
/// │ command bytes, each of LF CR ESC '+'     │ LF   │
/// │ preceded by ESC (0x1B)                   │ 0x0A │
/// └──────────────────────────────────────────┴──────┘
/// ```
pub fn encode_command(command: &[u8], dst: &mut BytesMut) {
    let escapes = command.iter().filter(|b| is_reserved(**b)).count();
    dst.reserve(command.len() + escapes + 1);
    for &byte in command {
        if is_reserved(byte) {
            dst.put_u8(ESC);
        }
        dst.put_u8(byte);
    }
    dst.put_u8(LF);
}

/// Escape a raw instrument command into a fresh, terminated buffer.
pub fn escape_command(command: &[u8]) -> Bytes {
    let mut buf = BytesMut::new();
    encode_command(command, &mut buf);
    buf.freeze()
}

/// Invert [`encode_command`] the way the bridge does.
///
/// `src` must be one complete escaped line including its terminating LF.
/// Any reserved byte not preceded by ESC, other than the final LF, is an error.
pub fn unescape_command(src: &[u8]) -> Result<Bytes> {
    let body = match src.split_last() {
        Some((&LF, body)) => body,
        Some(_) => return Err(FrameError::MissingTerminator),
        None => return Ok(Bytes::new()),
    };

    let mut out = BytesMut::with_capacity(body.len());
    let mut iter = body.iter().copied().enumerate();
    while let Some((offset, byte)) = iter.next() {
        if byte == ESC {
            match iter.next() {
                Some((_, escaped)) => out.put_u8(escaped),
                None => return Err(FrameError::DanglingEscape),
            }
        } else if is_reserved(byte) {
            return Err(FrameError::UnescapedReserved { byte, offset });
        } else {
            out.put_u8(byte);
        }
    }
    Ok(out.freeze())
}
