use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use gpibnet_bridge::{
    connect_with_config, BridgeConfig, BridgeSession, CancelToken, CommLog, FileCommLog,
    TracingCommLog, DEFAULT_EOT_CHAR,
};
use gpibnet_frame::GpibAddress;
use gpibnet_transport::{TcpTransport, DEFAULT_PORT};

use crate::exit::{bridge_error, io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod bridge_version;
pub mod query;
pub mod read;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one command to an instrument.
    Send(SendArgs),
    /// Read one response from an instrument.
    Read(ReadArgs),
    /// Send a command and read the response.
    Query(QueryArgs),
    /// Ask the bridge for its firmware version.
    BridgeVersion(BridgeVersionArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Query(args) => query::run(args, format),
        Command::BridgeVersion(args) => bridge_version::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Connection and protocol flags shared by every bridge subcommand.
#[derive(Args, Debug)]
pub struct BridgeArgs {
    /// Bridge hostname or IP address.
    #[arg(long, env = "GPIBNET_HOST")]
    pub host: String,
    /// Bridge TCP port.
    #[arg(long, env = "GPIBNET_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Primary read timeout (e.g. 100ms, 2s).
    #[arg(long, default_value = "100ms")]
    pub read_timeout: String,
    /// Secondary timeout used to confirm an end-of-transmission byte.
    #[arg(long, default_value = "10ms")]
    pub eot_timeout: String,
    /// Byte the bridge appends after each instrument response.
    #[arg(long, default_value_t = DEFAULT_EOT_CHAR)]
    pub eot_char: u8,
    /// Give up on a read after N primary timeouts. Default: wait forever.
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,
    /// TCP connect timeout (e.g. 5s).
    #[arg(long)]
    pub connect_timeout: Option<String>,
    /// Append every byte exchanged with the bridge to this file.
    #[arg(long, value_name = "PATH")]
    pub comm_log: Option<PathBuf>,
}

impl BridgeArgs {
    pub fn label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn to_config(&self) -> CliResult<BridgeConfig> {
        let connect_timeout = match &self.connect_timeout {
            Some(raw) => Some(parse_duration(raw)?),
            None => None,
        };
        Ok(BridgeConfig {
            read_timeout: parse_duration(&self.read_timeout)?,
            eot_timeout: parse_duration(&self.eot_timeout)?,
            eot_char: self.eot_char,
            connect_timeout,
            max_read_attempts: self.max_attempts,
            ..BridgeConfig::default()
        })
    }
}

/// A command given inline or read from a file.
#[derive(Args, Debug)]
pub struct CommandInput {
    /// Command text (e.g. "*IDN?").
    #[arg(value_name = "COMMAND", required_unless_present = "file")]
    pub command: Option<String>,
    /// Read the command from a file instead.
    #[arg(long, conflicts_with = "command")]
    pub file: Option<PathBuf>,
}

impl CommandInput {
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(command) = &self.command {
            return Ok(command.as_bytes().to_vec());
        }
        if let Some(path) = &self.file {
            let mut data = fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
            while matches!(data.last(), Some(b'\n' | b'\r')) {
                data.pop();
            }
            return Ok(data);
        }
        Err(CliError::new(USAGE, "no command given"))
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// GPIB primary address (0-30).
    pub addr: GpibAddress,
    #[command(flatten)]
    pub input: CommandInput,
    #[command(flatten)]
    pub bridge: BridgeArgs,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// GPIB primary address (0-30).
    pub addr: GpibAddress,
    #[command(flatten)]
    pub bridge: BridgeArgs,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// GPIB primary address (0-30).
    pub addr: GpibAddress,
    #[command(flatten)]
    pub input: CommandInput,
    #[command(flatten)]
    pub bridge: BridgeArgs,
}

#[derive(Args, Debug)]
pub struct BridgeVersionArgs {
    #[command(flatten)]
    pub bridge: BridgeArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Connect, configure the bridge, and arm Ctrl-C to cancel a pending read.
pub fn open_session(args: &BridgeArgs) -> CliResult<BridgeSession<TcpTransport>> {
    let config = args.to_config()?;

    let log: Box<dyn CommLog + Send> = match &args.comm_log {
        Some(path) => {
            let file = FileCommLog::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            Box::new((file, TracingCommLog))
        }
        None => Box::new(TracingCommLog),
    };

    let token = CancelToken::new();
    install_ctrlc_handler(token.clone())?;

    let session = connect_with_config(&args.host, args.port, config, log)
        .map_err(|err| bridge_error("connect failed", err))?;
    Ok(session.with_cancel_token(token))
}

fn install_ctrlc_handler(token: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || {
        token.cancel();
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
