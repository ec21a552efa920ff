use std::sync::{Arc, Mutex};

use bytes::Bytes;
use gpibnet_frame::GpibAddress;
use gpibnet_transport::BridgeTransport;

use crate::device::Instrument;
use crate::error::{BridgeError, Result};
use crate::session::BridgeSession;

/// A [`BridgeSession`] behind a mutex.
///
/// Every operation holds the lock for its full duration, so exchanges from
/// different threads never interleave on the wire. `query` holds it across
/// both the send and the read.
pub struct SharedSession<T: BridgeTransport> {
    inner: Arc<Mutex<BridgeSession<T>>>,
}

impl<T: BridgeTransport> Clone for SharedSession<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: BridgeTransport> SharedSession<T> {
    /// Wrap a session.
    pub fn new(session: BridgeSession<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut BridgeSession<T>) -> Result<R>) -> Result<R> {
        let mut session = self.inner.lock().map_err(|_| BridgeError::Poisoned)?;
        f(&mut session)
    }

    /// See [`BridgeSession::send`].
    pub fn send(&self, addr: GpibAddress, command: &[u8]) -> Result<()> {
        self.with(|session| session.send(addr, command))
    }

    /// See [`BridgeSession::read`].
    pub fn read(&self, addr: GpibAddress) -> Result<Bytes> {
        self.with(|session| session.read(addr))
    }

    /// See [`BridgeSession::query`].
    pub fn query(&self, addr: GpibAddress, command: &[u8]) -> Result<Bytes> {
        self.with(|session| session.query(addr, command))
    }

    /// An owned instrument handle bound to `addr`.
    pub fn device(&self, addr: GpibAddress) -> SharedDevice<T> {
        SharedDevice {
            session: self.clone(),
            addr,
        }
    }
}

impl<T: BridgeTransport> std::fmt::Debug for SharedSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSession")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

/// An instrument handle over a [`SharedSession`]. Cheap to clone and `Send`
/// when the transport is.
pub struct SharedDevice<T: BridgeTransport> {
    session: SharedSession<T>,
    addr: GpibAddress,
}

impl<T: BridgeTransport> Clone for SharedDevice<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            addr: self.addr,
        }
    }
}

impl<T: BridgeTransport> Instrument for SharedDevice<T> {
    fn address(&self) -> GpibAddress {
        self.addr
    }

    fn send(&mut self, command: &[u8]) -> Result<()> {
        self.session.send(self.addr, command)
    }

    fn read(&mut self) -> Result<Bytes> {
        self.session.read(self.addr)
    }

    fn query(&mut self, command: &[u8]) -> Result<Bytes> {
        self.session.query(self.addr, command)
    }
}

impl<T: BridgeTransport> std::fmt::Debug for SharedDevice<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDevice")
            .field("addr", &self.addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use gpibnet_transport::ScriptedTransport;

    use super::*;
    use crate::commlog::NullCommLog;
    use crate::config::BridgeConfig;

    fn addr(n: u8) -> GpibAddress {
        GpibAddress::new(n).unwrap()
    }

    fn shared() -> (SharedSession<ScriptedTransport>, ScriptedTransport) {
        let observer = ScriptedTransport::new();
        let session =
            BridgeSession::new(observer.clone(), BridgeConfig::default(), NullCommLog).unwrap();
        observer.clear_written();
        (session.into_shared(), observer)
    }

    #[test]
    fn queries_from_threads_do_not_interleave() {
        let (session, observer) = shared();
        observer
            .push_bytes(b"OK{")
            .push_timeout()
            .push_bytes(b"OK{")
            .push_timeout();

        let handles: Vec<_> = [(3u8, b"A?"), (4u8, b"B?")]
            .into_iter()
            .map(|(n, command)| {
                let mut device = session.device(addr(n));
                thread::spawn(move || device.query(command).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().as_ref(), b"OK");
        }

        let written = observer.written();
        let a: &[u8] = b"++addr 3\nA?\n++read eoi\n";
        let b: &[u8] = b"++addr 4\nB?\n++read eoi\n";
        assert!(
            written == [a, b].concat() || written == [b, a].concat(),
            "interleaved exchange: {:?}",
            written.escape_ascii().to_string()
        );
    }

    #[test]
    fn shared_session_tracks_selection() {
        let (session, observer) = shared();

        session.send(addr(5), b"A").unwrap();
        session.device(addr(5)).send(b"B").unwrap();
        session
            .with(|s| {
                assert_eq!(s.current_address(), Some(addr(5)));
                Ok(())
            })
            .unwrap();

        assert_eq!(observer.written(), b"++addr 5\nA\nB\n");
    }

    #[test]
    fn poisoned_lock_is_reported() {
        let (session, _observer) = shared();
        let clone = session.clone();
        let _ = thread::spawn(move || {
            clone
                .with(|_| -> Result<()> { panic!("driver bug") })
                .unwrap();
        })
        .join();

        assert!(matches!(
            session.send(addr(1), b"*RST"),
            Err(BridgeError::Poisoned)
        ));
    }
}
