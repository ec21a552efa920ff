use tracing::debug;

use crate::cmd::{open_session, QueryArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: QueryArgs, format: OutputFormat) -> CliResult<i32> {
    let command = args.input.resolve()?;
    let mut session = open_session(&args.bridge)?;

    let response = session
        .query(args.addr, &command)
        .map_err(|err| bridge_error("query failed", err))?;

    let stats = session.last_read_stats();
    debug!(
        addr = %args.addr,
        bytes = stats.bytes,
        stalls = stats.stalls,
        false_markers = stats.false_markers,
        "query complete"
    );

    print_response(&args.bridge.label(), args.addr, &response, stats, format);
    Ok(SUCCESS)
}
