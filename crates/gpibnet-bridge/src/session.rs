use bytes::Bytes;
use gpibnet_frame::{
    startup_sequence, CommandWriter, DecodeState, Directive, GpibAddress, ReadStats,
    ResponseDecoder, Step, Termination,
};
use gpibnet_transport::{BridgeTransport, TransportError};
use tracing::{debug, trace};

use crate::cancel::CancelToken;
use crate::commlog::CommLog;
use crate::config::BridgeConfig;
use crate::device::Device;
use crate::error::{BridgeError, Result};
use crate::shared::SharedSession;

/// Timeouts tolerated while waiting for the bridge's own reply (`++ver`).
pub const BRIDGE_REPLY_ATTEMPTS: u32 = 10;

/// Upper bound on bytes discarded by [`BridgeSession::resync`].
const RESYNC_DRAIN_LIMIT: usize = 1024 * 1024;

const BRIDGE_TAG: &str = "Bridge";

/// One connection to a GPIB-Ethernet bridge.
///
/// The bridge is a single logical channel shared by every instrument on the
/// bus. The session remembers which address the bridge currently talks to
/// and re-selects before any exchange with a different one.
///
/// All operations take `&mut self`: one exchange is in flight at a time.
/// Use [`SharedSession`] to share a session between threads.
pub struct BridgeSession<T: BridgeTransport> {
    transport: T,
    writer: CommandWriter,
    log: Box<dyn CommLog + Send>,
    config: BridgeConfig,
    current_address: Option<GpibAddress>,
    cancel: Option<CancelToken>,
    last_read: ReadStats,
}

impl<T: BridgeTransport> BridgeSession<T> {
    /// Start a session over a connected transport.
    ///
    /// Sends the bridge startup directives (auto-read off, EOS mode, EOT
    /// injection on, EOT byte) and applies the primary read timeout.
    pub fn new(
        transport: T,
        config: BridgeConfig,
        log: impl CommLog + Send + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let mut session = Self {
            transport,
            writer: CommandWriter::new(),
            log: Box::new(log),
            config,
            current_address: None,
            cancel: None,
            last_read: ReadStats::default(),
        };

        for directive in startup_sequence(session.config.eos, session.config.eot_char) {
            session.directive(&directive)?;
        }
        session.transport.set_timeout(session.config.read_timeout)?;
        debug!(
            eot_char = session.config.eot_char,
            read_timeout = ?session.config.read_timeout,
            eot_timeout = ?session.config.eot_timeout,
            "bridge session configured"
        );

        Ok(session)
    }

    /// Attach a cancel token checked between read attempts.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Attach or replace the cancel token.
    pub fn set_cancel_token(&mut self, token: Option<CancelToken>) {
        self.cancel = token;
    }

    /// The address the bridge is currently talking to, if any.
    pub fn current_address(&self) -> Option<GpibAddress> {
        self.current_address
    }

    /// Session configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Counters from the most recent read.
    pub fn last_read_stats(&self) -> ReadStats {
        self.last_read
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    /// Consume the session and return the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Select `addr` on the bridge unless it is already selected.
    pub fn select(&mut self, addr: GpibAddress) -> Result<()> {
        if self.current_address == Some(addr) {
            return Ok(());
        }
        // Unknown until the bridge has the new address.
        self.current_address = None;
        self.directive(&Directive::Addr(addr))?;
        self.current_address = Some(addr);
        Ok(())
    }

    /// Send an instrument command to `addr`. No response is consumed.
    pub fn send(&mut self, addr: GpibAddress, command: &[u8]) -> Result<()> {
        self.select(addr)?;
        let sent = self.writer.send_command(&mut self.transport, command)?;
        self.log.write(&format!("Send to {addr}"), sent);
        Ok(())
    }

    /// Read one complete response from `addr`.
    ///
    /// Blocks until the bridge relays a response ending in the EOT byte.
    /// Read timeouts re-issue the read directive and are never reported,
    /// unless `max_read_attempts` is set or the cancel token fires.
    pub fn read(&mut self, addr: GpibAddress) -> Result<Bytes> {
        self.select(addr)?;
        let tag = format!("Recv from {addr}");
        let termination = Termination::Eot(self.config.eot_char);
        let max_attempts = self.config.max_read_attempts;
        self.receive(Directive::ReadEoi, true, termination, max_attempts, &tag)
    }

    /// Send a command to `addr` and read its response.
    pub fn query(&mut self, addr: GpibAddress, command: &[u8]) -> Result<Bytes> {
        self.send(addr, command)?;
        self.read(addr)
    }

    /// A handle bound to `addr` that borrows this session.
    pub fn device(&mut self, addr: GpibAddress) -> Device<'_, T> {
        Device::new(self, addr)
    }

    /// Move the session behind a mutex for use from several threads.
    pub fn into_shared(self) -> SharedSession<T> {
        SharedSession::new(self)
    }

    /// Ask the bridge for its firmware version string.
    pub fn bridge_version(&mut self) -> Result<String> {
        let reply = self.receive(
            Directive::Ver,
            false,
            Termination::CrLf,
            Some(BRIDGE_REPLY_ATTEMPTS),
            "Recv from bridge",
        )?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    /// Recover after an abandoned read.
    ///
    /// Forgets the selected address and discards whatever the bridge still
    /// has buffered. Returns the number of bytes discarded.
    pub fn resync(&mut self) -> Result<usize> {
        self.current_address = None;
        self.transport.set_timeout(self.config.eot_timeout)?;

        let mut discarded = Vec::new();
        let result = loop {
            if discarded.len() >= RESYNC_DRAIN_LIMIT {
                break Ok(discarded.len());
            }
            match self.transport.recv_byte() {
                Ok(byte) => discarded.push(byte),
                Err(TransportError::Timeout(_)) => break Ok(discarded.len()),
                Err(err) => break Err(err.into()),
            }
        };

        let drained = discarded.len();
        if drained > 0 {
            self.log.write("Discard", &discarded);
        }
        self.transport.set_timeout(self.config.read_timeout)?;
        let message = format!("Resynchronized, discarded {drained} bytes");
        self.log.event(&message);
        result
    }

    fn directive(&mut self, directive: &Directive) -> Result<()> {
        let sent = self.writer.send_directive(&mut self.transport, directive)?;
        self.log.write(BRIDGE_TAG, sent);
        Ok(())
    }

    fn flush_received(&mut self, tag: &str, received: &mut Vec<u8>) {
        if !received.is_empty() {
            self.log.write(tag, received);
            received.clear();
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(BridgeError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Issue `request`, then decode one reply. The primary timeout is in
    /// force again on every return path.
    fn receive(
        &mut self,
        request: Directive,
        reissue: bool,
        termination: Termination,
        max_attempts: Option<u32>,
        tag: &str,
    ) -> Result<Bytes> {
        let mut decoder = ResponseDecoder::new(termination);
        let mut received = Vec::new();
        let result = self.directive(&request).and_then(|()| {
            self.drive(
                &mut decoder,
                &mut received,
                &request,
                reissue,
                max_attempts,
                tag,
            )
        });

        self.flush_received(tag, &mut received);
        self.last_read = decoder.stats();
        let restored = self.transport.set_timeout(self.config.read_timeout);

        let reply = result?;
        restored?;
        trace!(
            len = reply.len(),
            stalls = self.last_read.stalls,
            false_markers = self.last_read.false_markers,
            "response complete"
        );
        Ok(reply)
    }

    /// Received bytes collect in `received` and reach the comm log in one
    /// record per run between protocol events.
    fn drive(
        &mut self,
        decoder: &mut ResponseDecoder,
        received: &mut Vec<u8>,
        request: &Directive,
        reissue: bool,
        max_attempts: Option<u32>,
        tag: &str,
    ) -> Result<Bytes> {
        let mut attempts: u32 = 1;
        loop {
            match self.transport.recv_byte() {
                Ok(byte) => {
                    received.push(byte);
                    let was_disambiguating = decoder.state() == DecodeState::Disambiguating;
                    match decoder.push(byte)? {
                        Step::Continue | Step::Stalled => {}
                        Step::Disambiguate => {
                            self.flush_received(tag, received);
                            if was_disambiguating {
                                self.log.event("Fake EOT, continuing");
                            }
                            self.log.event("Potential EOT break");
                            self.transport.set_timeout(self.config.eot_timeout)?;
                        }
                        Step::Resume => {
                            self.flush_received(tag, received);
                            self.log.event("Fake EOT, continuing");
                            self.transport.set_timeout(self.config.read_timeout)?;
                        }
                        Step::Complete(reply) => return Ok(reply),
                    }
                }
                Err(TransportError::Timeout(_)) => match decoder.timed_out()? {
                    Step::Complete(reply) => {
                        self.flush_received(tag, received);
                        self.log.event("EOT break was real");
                        return Ok(reply);
                    }
                    _ => {
                        self.flush_received(tag, received);
                        self.check_cancelled()?;
                        if max_attempts.is_some_and(|max| attempts >= max) {
                            let message = format!("Giving up after {attempts} attempts");
                            self.log.event(&message);
                            return Err(BridgeError::ReadAttemptsExhausted { attempts });
                        }
                        attempts += 1;
                        if reissue {
                            self.log.event("Timed out, issuing another read");
                            self.directive(request)?;
                        } else {
                            self.log.event("Timed out, still waiting");
                        }
                    }
                },
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl<T: BridgeTransport> std::fmt::Debug for BridgeSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSession")
            .field("current_address", &self.current_address)
            .field("config", &self.config)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gpibnet_transport::ScriptedTransport;

    use super::*;
    use crate::commlog::{CommRecord, MemoryCommLog, NullCommLog};

    const READ_EOI: &[u8] = b"++read eoi\n";

    fn addr(n: u8) -> GpibAddress {
        GpibAddress::new(n).unwrap()
    }

    type Fixture = (BridgeSession<ScriptedTransport>, ScriptedTransport);

    fn session_with(config: BridgeConfig) -> Fixture {
        let observer = ScriptedTransport::new();
        let session = BridgeSession::new(observer.clone(), config, NullCommLog).unwrap();
        observer.clear_written();
        (session, observer)
    }

    fn session() -> Fixture {
        session_with(BridgeConfig::default())
    }

    #[test]
    fn startup_sequence_is_sent_once() {
        let observer = ScriptedTransport::new();
        let session =
            BridgeSession::new(observer.clone(), BridgeConfig::default(), NullCommLog).unwrap();

        assert_eq!(
            observer.written(),
            b"++auto 0\n++eos 2\n++eot_enable 1\n++eot_char 123\n"
        );
        assert_eq!(observer.timeout(), session.config().read_timeout);
        assert_eq!(session.current_address(), None);
    }

    #[test]
    fn invalid_config_sends_nothing() {
        let observer = ScriptedTransport::new();
        let config = BridgeConfig {
            eot_timeout: Duration::from_secs(1),
            ..BridgeConfig::default()
        };
        let err = BridgeSession::new(observer.clone(), config, NullCommLog).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
        assert!(observer.written().is_empty());
    }

    #[test]
    fn select_is_idempotent() {
        let (mut session, observer) = session();

        session.select(addr(7)).unwrap();
        session.select(addr(7)).unwrap();

        assert_eq!(observer.written_count(b"++addr 7\n"), 1);
        assert_eq!(session.current_address(), Some(addr(7)));
    }

    #[test]
    fn sends_reselect_only_on_address_change() {
        let (mut session, observer) = session();

        session.send(addr(5), b"A").unwrap();
        session.send(addr(5), b"B").unwrap();
        session.send(addr(2), b"C").unwrap();

        assert_eq!(observer.written(), b"++addr 5\nA\nB\n++addr 2\nC\n");
    }

    #[test]
    fn send_escapes_command() {
        let (mut session, observer) = session();
        session.send(addr(1), b"DISP \"1+1\"\r\n").unwrap();
        assert_eq!(
            observer.written(),
            b"++addr 1\nDISP \"1\x1b+1\"\x1b\r\x1b\n\n"
        );
    }

    #[test]
    fn read_genuine_eot() {
        let (mut session, observer) = session();
        observer.push_bytes(b"HELLO{").push_timeout();

        let reply = session.read(addr(3)).unwrap();

        assert_eq!(reply.as_ref(), b"HELLO");
        assert_eq!(observer.written(), b"++addr 3\n++read eoi\n");
        assert_eq!(observer.remaining(), 0);
    }

    #[test]
    fn read_with_custom_marker() {
        let config = BridgeConfig {
            eot_char: 0x00,
            ..BridgeConfig::default()
        };
        let (mut session, observer) = session_with(config);
        observer.push_bytes(b"1.25E+0\x00").push_timeout();

        assert_eq!(session.read(addr(9)).unwrap().as_ref(), b"1.25E+0");
    }

    #[test]
    fn read_marker_inside_payload() {
        let (mut session, observer) = session();
        observer.push_bytes(b"ab{cd{").push_timeout();

        let reply = session.read(addr(3)).unwrap();

        assert_eq!(reply.as_ref(), b"ab{cd");
        assert_eq!(session.last_read_stats().false_markers, 1);
    }

    #[test]
    fn read_consecutive_markers() {
        let (mut session, observer) = session();
        observer.push_bytes(b"{{x{{").push_timeout();

        assert_eq!(session.read(addr(3)).unwrap().as_ref(), b"{{x{");
    }

    #[test]
    fn read_binary_block_with_many_markers() {
        let mut payload = b"#210".to_vec();
        payload.extend([0x7B, 0x00, 0x7B, 0x7B, 0xFF, 0x0A, 0x7B, 0x01, 0x7B, 0x02]);
        let (mut session, observer) = session();
        observer
            .push_bytes(&payload)
            .push_bytes(b"{")
            .push_timeout();

        assert_eq!(session.read(addr(3)).unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn read_retries_on_stall() {
        let (mut session, observer) = session();
        observer.push_timeouts(4).push_bytes(b"42{").push_timeout();

        let reply = session.read(addr(6)).unwrap();

        assert_eq!(reply.as_ref(), b"42");
        assert_eq!(observer.written_count(READ_EOI), 5);
        assert_eq!(session.last_read_stats().stalls, 4);
    }

    #[test]
    fn stall_in_middle_of_response_keeps_partial_data() {
        let (mut session, observer) = session();
        observer
            .push_bytes(b"+1.0")
            .push_timeouts(2)
            .push_bytes(b"E-3{")
            .push_timeout();

        assert_eq!(session.read(addr(6)).unwrap().as_ref(), b"+1.0E-3");
        assert_eq!(observer.written_count(READ_EOI), 3);
    }

    #[test]
    fn timeouts_switch_and_restore() {
        let (mut session, observer) = session();
        let primary = session.config().read_timeout;
        let secondary = session.config().eot_timeout;
        let before = observer.timeout_history().len();
        observer.push_bytes(b"a{b{").push_timeout();

        session.read(addr(4)).unwrap();

        let history = observer.timeout_history()[before..].to_vec();
        assert_eq!(history, vec![secondary, primary, secondary, primary]);
        assert_eq!(observer.timeout(), primary);
    }

    #[test]
    fn primary_timeout_restored_after_transport_error() {
        let (mut session, observer) = session();
        // Marker then end of script: the stream closes mid-disambiguation.
        observer.push_bytes(b"x{");

        let err = session.read(addr(4)).unwrap_err();

        assert!(matches!(
            err,
            BridgeError::Transport(TransportError::Closed)
        ));
        assert_eq!(observer.timeout(), session.config().read_timeout);
    }

    #[test]
    fn write_failure_during_read_is_a_transport_error() {
        let (mut session, observer) = session();
        session.select(addr(4)).unwrap();
        observer.close_writes();

        let err = session.read(addr(4)).unwrap_err();

        assert!(matches!(
            err,
            BridgeError::Transport(TransportError::Closed)
        ));
        assert_eq!(observer.timeout(), session.config().read_timeout);
    }

    #[test]
    fn write_failure_during_send_is_a_transport_error() {
        let (mut session, observer) = session();
        observer.close_writes();

        let err = session.send(addr(4), b"*RST").unwrap_err();

        assert!(matches!(
            err,
            BridgeError::Transport(TransportError::Closed)
        ));
        assert_eq!(session.current_address(), None);
    }

    #[test]
    fn received_bytes_logged_per_run() {
        let log = MemoryCommLog::new();
        let observer = ScriptedTransport::new();
        let mut session =
            BridgeSession::new(observer.clone(), BridgeConfig::default(), log.clone()).unwrap();
        let mut block = b"#3512".to_vec();
        block.extend(std::iter::repeat_n(b'7', 512));
        block.push(b'{');
        observer.push_bytes(&block).push_timeout();

        session.read(addr(3)).unwrap();

        let recv_records: Vec<_> = log
            .records()
            .into_iter()
            .filter(|r| matches!(r, CommRecord::Data { tag, .. } if tag == "Recv from 3"))
            .collect();
        assert_eq!(recv_records.len(), 1);
        assert_eq!(log.data_for("Recv from 3"), block);
    }

    #[test]
    fn query_sends_then_reads() {
        let (mut session, observer) = session();
        observer
            .push_bytes(b"HEWLETT-PACKARD,E3631A,0,2.1-5.0-1.0{")
            .push_timeout();

        let idn = session.query(addr(5), b"*IDN?").unwrap();

        assert_eq!(idn.as_ref(), b"HEWLETT-PACKARD,E3631A,0,2.1-5.0-1.0");
        assert_eq!(observer.written(), b"++addr 5\n*IDN?\n++read eoi\n");
    }

    #[test]
    fn read_after_other_address_reselects() {
        let (mut session, observer) = session();
        observer.push_bytes(b"1{").push_timeout();

        session.send(addr(2), b"T3").unwrap();
        session.send(addr(8), b"OUTP ON").unwrap();
        session.read(addr(2)).unwrap();

        assert_eq!(
            observer.written(),
            b"++addr 2\nT3\n++addr 8\nOUTP ON\n++addr 2\n++read eoi\n"
        );
    }

    #[test]
    fn attempt_cap_gives_up() {
        let config = BridgeConfig {
            max_read_attempts: Some(3),
            ..BridgeConfig::default()
        };
        let (mut session, observer) = session_with(config);
        observer.push_timeouts(10);

        let err = session.read(addr(1)).unwrap_err();

        assert!(matches!(
            err,
            BridgeError::ReadAttemptsExhausted { attempts: 3 }
        ));
        assert!(err.needs_resync());
        assert_eq!(observer.written_count(READ_EOI), 3);
        assert_eq!(observer.remaining(), 7);
    }

    #[test]
    fn cancelled_read_returns_after_next_timeout() {
        let token = CancelToken::new();
        let (session, observer) = session();
        let mut session = session.with_cancel_token(token.clone());
        observer.push_timeouts(5);
        token.cancel();

        let err = session.read(addr(1)).unwrap_err();

        assert!(matches!(err, BridgeError::Cancelled));
        assert_eq!(observer.written_count(READ_EOI), 1);
        assert_eq!(observer.timeout(), session.config().read_timeout);
    }

    #[test]
    fn cancel_token_does_not_interrupt_flowing_data() {
        let token = CancelToken::new();
        let (session, observer) = session();
        let mut session = session.with_cancel_token(token.clone());
        observer.push_bytes(b"OK{").push_timeout();
        token.cancel();

        assert_eq!(session.read(addr(1)).unwrap().as_ref(), b"OK");
    }

    #[test]
    fn comm_log_records_traffic_and_events() {
        let log = MemoryCommLog::new();
        let observer = ScriptedTransport::new();
        let mut session =
            BridgeSession::new(observer.clone(), BridgeConfig::default(), log.clone()).unwrap();
        observer.push_timeout().push_bytes(b"a{b{").push_timeout();

        session.query(addr(5), b"MEAS?").unwrap();

        assert_eq!(log.data_for("Send to 5"), b"MEAS?\n");
        assert_eq!(log.data_for("Recv from 5"), b"a{b{");
        assert_eq!(
            log.data_for("Bridge"),
            b"++auto 0\n++eos 2\n++eot_enable 1\n++eot_char 123\n++addr 5\n++read eoi\n++read eoi\n"
        );
        assert_eq!(
            log.events(),
            vec![
                "Timed out, issuing another read",
                "Potential EOT break",
                "Fake EOT, continuing",
                "Potential EOT break",
                "EOT break was real",
            ]
        );
    }

    #[test]
    fn bridge_version_reads_crlf_line() {
        let (mut session, observer) = session();
        observer
            .push_timeout()
            .push_bytes(b"Prologix GPIB-ETHERNET Controller version 01.06.06.00\r\n");

        let version = session.bridge_version().unwrap();

        assert_eq!(
            version,
            "Prologix GPIB-ETHERNET Controller version 01.06.06.00"
        );
        assert_eq!(observer.written(), b"++ver\n");
        assert_eq!(session.current_address(), None);
    }

    #[test]
    fn bridge_version_gives_up() {
        let (mut session, observer) = session();
        observer.push_timeouts(BRIDGE_REPLY_ATTEMPTS as usize);

        let err = session.bridge_version().unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ReadAttemptsExhausted { attempts } if attempts == BRIDGE_REPLY_ATTEMPTS
        ));
        assert_eq!(observer.written_count(b"++ver\n"), 1);
    }

    #[test]
    fn resync_discards_and_forgets_address() {
        let (mut session, observer) = session();
        session.select(addr(5)).unwrap();
        observer.push_bytes(b"stale").push_timeout();

        assert_eq!(session.resync().unwrap(), 5);
        assert_eq!(session.current_address(), None);
        assert_eq!(observer.timeout(), session.config().read_timeout);

        observer.clear_written();
        session.send(addr(5), b"*CLS").unwrap();
        assert_eq!(observer.written(), b"++addr 5\n*CLS\n");
    }
}
