use gpibnet_transport::TcpTransport;

use crate::commlog::{CommLog, TracingCommLog};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::session::BridgeSession;

/// Connect to a bridge with the default configuration, logging traffic to
/// `tracing`.
pub fn connect(host: &str, port: u16) -> Result<BridgeSession<TcpTransport>> {
    connect_with_config(host, port, BridgeConfig::default(), TracingCommLog)
}

/// Connect with explicit configuration and diagnostic log.
///
/// A failed connection is returned immediately; there is no retry.
pub fn connect_with_config(
    host: &str,
    port: u16,
    config: BridgeConfig,
    log: impl CommLog + Send + 'static,
) -> Result<BridgeSession<TcpTransport>> {
    config.validate()?;

    let transport = match config.connect_timeout {
        Some(timeout) => TcpTransport::connect_timeout(host, port, timeout)?,
        None => TcpTransport::connect(host, port)?,
    };

    BridgeSession::new(transport, config, log)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    use gpibnet_frame::GpibAddress;
    use gpibnet_transport::TransportError;

    use super::*;
    use crate::commlog::NullCommLog;
    use crate::device::Instrument;
    use crate::error::BridgeError;

    const READ_EOI: &[u8] = b"++read eoi\n";

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            read_timeout: Duration::from_millis(300),
            eot_timeout: Duration::from_millis(60),
            connect_timeout: Some(Duration::from_secs(2)),
            ..BridgeConfig::default()
        }
    }

    /// Accepts one connection. Answers the first `++read eoi` after `delay`
    /// with `reply`, then records everything until the client hangs up.
    fn fake_bridge(reply: &'static [u8], delay: Duration) -> (u16, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept should succeed");
            let mut seen = Vec::new();
            let mut answered = false;
            let mut chunk = [0u8; 256];
            loop {
                let n = stream.read(&mut chunk).expect("read should succeed");
                if n == 0 {
                    return seen;
                }
                seen.extend_from_slice(&chunk[..n]);
                if !answered && seen.windows(READ_EOI.len()).any(|w| w == READ_EOI) {
                    answered = true;
                    thread::sleep(delay);
                    stream.write_all(reply).expect("write should succeed");
                }
            }
        });

        (port, handle)
    }

    #[test]
    fn query_over_tcp() {
        let (port, server) = fake_bridge(b"FAKE,DMM,1{x{", Duration::ZERO);

        let mut session =
            connect_with_config("127.0.0.1", port, test_config(), NullCommLog).unwrap();
        let mut dmm = session.device(GpibAddress::new(5).unwrap());
        let reply = dmm.query(b"*IDN?").unwrap();
        assert_eq!(reply.as_ref(), b"FAKE,DMM,1{x");
        drop(session);

        let seen = server.join().expect("server thread should complete");
        assert_eq!(
            seen,
            b"++auto 0\n++eos 2\n++eot_enable 1\n++eot_char 123\n++addr 5\n*IDN?\n++read eoi\n"
        );
    }

    #[test]
    fn slow_instrument_triggers_read_retries() {
        let (port, server) = fake_bridge(b"+4.99E+0{", Duration::from_millis(700));

        let mut session =
            connect_with_config("127.0.0.1", port, test_config(), NullCommLog).unwrap();
        let reply = session.read(GpibAddress::new(2).unwrap()).unwrap();
        assert_eq!(reply.as_ref(), b"+4.99E+0");
        assert!(session.last_read_stats().stalls >= 1);
        drop(session);

        let seen = server.join().expect("server thread should complete");
        let directives = seen
            .windows(READ_EOI.len())
            .filter(|w| *w == READ_EOI)
            .count();
        assert!(directives >= 2, "expected re-issued reads, saw {directives}");
    }

    #[test]
    fn connect_failure_is_fatal() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = connect_with_config("127.0.0.1", port, test_config(), NullCommLog).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Transport(TransportError::Connect { .. })
        ));
    }

    #[test]
    fn invalid_config_rejected_before_connecting() {
        let config = BridgeConfig {
            eot_timeout: Duration::from_secs(5),
            ..test_config()
        };
        // Nothing listens here; validation must fail first.
        let err = connect_with_config("127.0.0.1", 9, config, NullCommLog).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
    }

    #[test]
    fn bridge_closing_mid_read_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _): (TcpStream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(50));
            drop(stream);
        });

        let mut session =
            connect_with_config("127.0.0.1", port, test_config(), NullCommLog).unwrap();
        server.join().unwrap();
        let err = session.read(GpibAddress::new(1).unwrap()).unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }
}
