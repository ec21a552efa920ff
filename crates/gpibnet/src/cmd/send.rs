use crate::cmd::{open_session, SendArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let command = args.input.resolve()?;
    let mut session = open_session(&args.bridge)?;

    session
        .send(args.addr, &command)
        .map_err(|err| bridge_error("send failed", err))?;

    print_sent(&args.bridge.label(), args.addr, command.len(), format);
    Ok(SUCCESS)
}
