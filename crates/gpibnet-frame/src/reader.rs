//! Response boundary detection.
//!
//! The bridge relays an instrument response as a bare byte stream. Its only
//! end marker is an injected EOT byte whose value is not reserved in the
//! instrument's own data, so seeing that byte is ambiguous: it ends the
//! response only if nothing follows it within a short window.
//!
//! [`ResponseDecoder`] is the transport-agnostic state machine. The caller
//! feeds it received bytes and receive timeouts and acts on the returned
//! [`Step`]:
//!
//! ```text
//!            byte != eot                      byte (any)
//!           ┌──────────┐            ┌─────────────────────────┐
//!           ▼          │            │ (payload; re-examined)  │
//!   ┌──────────────┐───┘  eot   ┌───┴────────────┐   timeout  ┌──────┐
//!   │ AwaitingData │──────────▶│ Disambiguating │──────────▶│ Done │
//!   └──────────────┘◀──────────└────────────────┘            └──────┘
//!        │   ▲      byte != eot
//!        └───┘ timeout: re-issue read directive
//! ```

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{CR, LF};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// How the end of a response is recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Bridge-injected end-of-transmission byte, confirmed by a short silence.
    Eot(u8),
    /// Line ending in LF, with a trailing CR LF (or LF) trimmed.
    ///
    /// Some hosts read instruments this way, trimming the last two bytes of a
    /// line instead of asking the bridge for an EOT byte. It cannot carry
    /// binary payloads containing LF, so it is only used for the bridge's own
    /// text replies.
    CrLf,
}

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Waiting for (more) response bytes; primary timeout applies.
    AwaitingData,
    /// Just saw a possible EOT byte; secondary timeout applies.
    Disambiguating,
    /// Response complete.
    Done,
}

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Keep receiving with the primary timeout.
    Continue,
    /// Possible EOT byte; receive one more byte with the secondary timeout.
    Disambiguate,
    /// A possible EOT byte was followed by data and kept as payload.
    /// Restore the primary timeout and keep receiving.
    Resume,
    /// Nothing arrived while awaiting data; re-issue the read directive.
    Stalled,
    /// The response is complete, terminator removed.
    Complete(Bytes),
}

/// Counters describing one decoded response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Bytes received, terminator included.
    pub bytes: usize,
    /// Timeouts while awaiting data.
    pub stalls: u32,
    /// EOT-valued bytes that turned out to be payload.
    pub false_markers: u32,
}

/// Accumulates one response and decides where it ends.
#[derive(Debug)]
pub struct ResponseDecoder {
    termination: Termination,
    buf: BytesMut,
    state: DecodeState,
    stats: ReadStats,
}

impl ResponseDecoder {
    /// Create a decoder for one response.
    pub fn new(termination: Termination) -> Self {
        Self {
            termination,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: DecodeState::AwaitingData,
            stats: ReadStats::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> ReadStats {
        self.stats
    }

    /// Bytes accumulated so far, terminator candidates included.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Feed one received byte.
    pub fn push(&mut self, byte: u8) -> Result<Step> {
        if self.state == DecodeState::Done {
            return Err(FrameError::DecoderFinished);
        }

        self.buf.extend_from_slice(&[byte]);
        self.stats.bytes += 1;

        match self.termination {
            Termination::Eot(eot) => Ok(self.push_eot(byte, eot)),
            Termination::CrLf => Ok(self.push_line(byte)),
        }
    }

    fn push_eot(&mut self, byte: u8, eot: u8) -> Step {
        let was_disambiguating = self.state == DecodeState::Disambiguating;
        if was_disambiguating {
            self.stats.false_markers += 1;
            trace!(eot, "EOT byte followed by data, keeping it as payload");
        }

        if byte == eot {
            self.state = DecodeState::Disambiguating;
            Step::Disambiguate
        } else if was_disambiguating {
            self.state = DecodeState::AwaitingData;
            Step::Resume
        } else {
            Step::Continue
        }
    }

    fn push_line(&mut self, byte: u8) -> Step {
        if byte != LF {
            return Step::Continue;
        }
        self.buf.truncate(self.buf.len() - 1);
        if self.buf.last() == Some(&CR) {
            self.buf.truncate(self.buf.len() - 1);
        }
        self.finish()
    }

    /// Report that a receive timed out.
    pub fn timed_out(&mut self) -> Result<Step> {
        match self.state {
            DecodeState::AwaitingData => {
                self.stats.stalls += 1;
                Ok(Step::Stalled)
            }
            DecodeState::Disambiguating => {
                // Silence after the EOT byte: it was the real terminator.
                self.buf.truncate(self.buf.len() - 1);
                Ok(self.finish())
            }
            DecodeState::Done => Err(FrameError::DecoderFinished),
        }
    }

    fn finish(&mut self) -> Step {
        self.state = DecodeState::Done;
        Step::Complete(self.buf.split().freeze())
    }
}
