//! Identify one instrument on a real bridge.
//!
//! Run with:
//!   cargo run --example identify -- 10.30.42.1 5

use gpibnet::bridge::{connect, Instrument};
use gpibnet::frame::GpibAddress;
use gpibnet::transport::DEFAULT_PORT;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "192.168.1.50".to_string());
    let addr: GpibAddress = args.next().as_deref().unwrap_or("1").parse()?;

    let mut session = connect(&host, DEFAULT_PORT)?;
    eprintln!("[client] bridge: {}", session.bridge_version()?.trim());

    let mut inst = session.device(addr);
    let idn = inst.query(b"*IDN?")?;
    println!("{addr}: {}", String::from_utf8_lossy(&idn).trim_end());

    let stats = session.last_read_stats();
    eprintln!(
        "[client] {} bytes, {} stalls, {} false markers",
        stats.bytes, stats.stalls, stats.false_markers
    );
    Ok(())
}
