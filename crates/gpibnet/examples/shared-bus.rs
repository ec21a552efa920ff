//! Shared-bus example: several threads query different instruments through
//! one bridge connection.
//!
//! A fake bridge runs in-process, so no hardware is needed.
//!
//! Run with:
//!   cargo run --example shared-bus

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;

use gpibnet::bridge::{connect, Instrument};
use gpibnet::frame::GpibAddress;

/// Answers every `++read eoi` with an identity string for the selected
/// address followed by the EOT byte.
fn fake_bridge(listener: TcpListener) -> std::io::Result<()> {
    let (stream, _) = listener.accept()?;
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    let mut selected = 0u8;
    for line in reader.split(b'\n') {
        let line = line?;
        if let Some(addr) = line.strip_prefix(b"++addr ") {
            selected = String::from_utf8_lossy(addr).trim().parse().unwrap_or(0);
        } else if line == b"++read eoi" {
            writer.write_all(format!("FAKE,INST{selected},0,1.0{{").as_bytes())?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let server = thread::spawn(move || fake_bridge(listener));

    let shared = connect("127.0.0.1", port)?.into_shared();

    let workers: Vec<_> = [3u8, 7, 12]
        .into_iter()
        .map(|raw| {
            let mut dev = shared.device(GpibAddress::new(raw)?);
            Ok(thread::spawn(move || {
                let addr = dev.address();
                for _ in 0..3 {
                    match dev.query(b"*IDN?") {
                        Ok(idn) => eprintln!("[addr {addr}] {}", String::from_utf8_lossy(&idn)),
                        Err(err) => eprintln!("[addr {addr}] error: {err}"),
                    }
                }
            }))
        })
        .collect::<Result<_, gpibnet::frame::FrameError>>()?;

    for worker in workers {
        let _ = worker.join();
    }

    drop(shared);
    let _ = server.join();
    Ok(())
}
