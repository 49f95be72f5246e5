use ampwire_session::Ack;

use crate::cmd::{runtime, RunContext, SourceArgs};
use crate::exit::{control_error, CliError, CliResult, SUCCESS};
use crate::output::print_command;

pub fn run(args: SourceArgs, ctx: &RunContext) -> CliResult<i32> {
    let settings = ctx.device_settings()?;

    runtime()?.block_on(async {
        let (controller, _feedback) = ctx.start_controller(settings);
        let result = controller.set_source(args.input).await;
        let ack = Ack::from_result(&result);
        controller.pool().shutdown().await;

        result.map_err(|err| control_error("source select failed", err))?;
        print_command("source", ack, None, &controller.snapshot(), ctx.format);
        Ok::<_, CliError>(SUCCESS)
    })
}
