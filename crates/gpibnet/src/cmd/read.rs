use crate::cmd::{open_session, ReadArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = open_session(&args.bridge)?;

    let response = session
        .read(args.addr)
        .map_err(|err| bridge_error("read failed", err))?;

    print_response(
        &args.bridge.label(),
        args.addr,
        &response,
        session.last_read_stats(),
        format,
    );
    Ok(SUCCESS)
}
