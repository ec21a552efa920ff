use crate::cmd::{open_session, BridgeVersionArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_bridge_version, OutputFormat};

pub fn run(args: BridgeVersionArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = open_session(&args.bridge)?;

    let version = session
        .bridge_version()
        .map_err(|err| bridge_error("bridge version request failed", err))?;

    print_bridge_version(&args.bridge.label(), version.trim(), format);
    Ok(SUCCESS)
}
