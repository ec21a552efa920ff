use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gpibnet_frame::{GpibAddress, ReadStats};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Raw
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    bridge: &'a str,
    address: u8,
    size: usize,
    response: String,
    stalls: u32,
    false_markers: u32,
}

pub fn print_response(
    bridge: &str,
    addr: GpibAddress,
    data: &[u8],
    stats: ReadStats,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                bridge,
                address: addr.get(),
                size: data.len(),
                response: text_preview(data),
                stalls: stats.stalls,
                false_markers: stats.false_markers,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDR", "SIZE", "STALLS", "RESPONSE"])
                .add_row(vec![
                    addr.to_string(),
                    data.len().to_string(),
                    stats.stalls.to_string(),
                    text_preview(data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{}", text_preview(data).trim_end());
        }
        OutputFormat::Raw => print_raw(data),
    }
}

#[derive(Serialize)]
struct SentOutput<'a> {
    bridge: &'a str,
    address: u8,
    size: usize,
    sent: bool,
}

pub fn print_sent(bridge: &str, addr: GpibAddress, size: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SentOutput {
                bridge,
                address: addr.get(),
                size,
                sent: true,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["ADDR", "SIZE", "STATUS"])
                .add_row(vec![addr.to_string(), size.to_string(), "sent".to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("sent {size} bytes to address {addr}"),
        OutputFormat::Raw => {}
    }
}

#[derive(Serialize)]
struct BridgeOutput<'a> {
    bridge: &'a str,
    version: &'a str,
}

pub fn print_bridge_version(bridge: &str, version: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = BridgeOutput { bridge, version };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["BRIDGE", "VERSION"])
                .add_row(vec![bridge.to_string(), version.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => println!("{version}"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn text_preview(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", data.len()),
    }
}
