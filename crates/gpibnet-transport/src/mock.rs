//! Scripted in-memory transport for testing without a bridge.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::traits::BridgeTransport;

/// One scripted receive outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    /// `recv_byte` returns this byte.
    Byte(u8),
    /// `recv_byte` times out.
    Timeout,
}

/// Transport that replays a script of receive outcomes and records everything
/// sent to it.
///
/// Clones share state, so a test can keep one handle for inspection after
/// moving another into a session. An exhausted script reports
/// [`TransportError::Closed`] instead of blocking.
#[derive(Clone)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<ScriptedInner>>,
}

struct ScriptedInner {
    script: VecDeque<ScriptStep>,
    written: Vec<u8>,
    timeout: Duration,
    timeout_history: Vec<Duration>,
    writes_closed: bool,
}

impl ScriptedTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptedInner {
                script: VecDeque::new(),
                written: Vec::new(),
                timeout: Duration::from_secs(1),
                timeout_history: Vec::new(),
                writes_closed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue bytes to be received one at a time.
    pub fn push_bytes(&self, data: &[u8]) -> &Self {
        self.lock()
            .script
            .extend(data.iter().copied().map(ScriptStep::Byte));
        self
    }

    /// Queue one receive timeout.
    pub fn push_timeout(&self) -> &Self {
        self.push_timeouts(1)
    }

    /// Queue `count` consecutive receive timeouts.
    pub fn push_timeouts(&self, count: usize) -> &Self {
        self.lock()
            .script
            .extend(std::iter::repeat_n(ScriptStep::Timeout, count));
        self
    }

    /// Everything sent so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Number of times `needle` occurs in the sent bytes.
    pub fn written_count(&self, needle: &[u8]) -> usize {
        if needle.is_empty() {
            return 0;
        }
        self.lock()
            .written
            .windows(needle.len())
            .filter(|w| *w == needle)
            .count()
    }

    /// Clear the record of sent bytes.
    pub fn clear_written(&self) {
        self.lock().written.clear();
    }

    /// Every timeout passed to `set_timeout`, in order.
    pub fn timeout_history(&self) -> Vec<Duration> {
        self.lock().timeout_history.clone()
    }

    /// Make every later `send` fail with [`TransportError::Closed`].
    pub fn close_writes(&self) {
        self.lock().writes_closed = true;
    }

    /// Script steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lock().script.len()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeTransport for ScriptedTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.writes_closed {
            return Err(TransportError::Closed);
        }
        inner.written.extend_from_slice(data);
        Ok(())
    }

    fn recv_byte(&mut self) -> Result<u8> {
        let mut inner = self.lock();
        match inner.script.pop_front() {
            Some(ScriptStep::Byte(b)) => Ok(b),
            Some(ScriptStep::Timeout) => Err(TransportError::Timeout(inner.timeout)),
            None => Err(TransportError::Closed),
        }
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(TransportError::InvalidTimeout(timeout));
        }
        let mut inner = self.lock();
        inner.timeout = timeout;
        inner.timeout_history.push(timeout);
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.lock().timeout
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ScriptedTransport")
            .field("remaining", &inner.script.len())
            .field("written", &inner.written.len())
            .field("timeout", &inner.timeout)
            .finish()
    }
}
