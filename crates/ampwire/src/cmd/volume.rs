use ampwire_session::{Ack, VolumeMode};

use crate::cmd::{runtime, RunContext, VolumeCommand};
use crate::exit::{control_error, CliError, CliResult, SUCCESS};
use crate::output::print_command;

pub fn run(command: VolumeCommand, ctx: &RunContext) -> CliResult<i32> {
    let (name, mode, value) = match command {
        VolumeCommand::Set(args) => ("volume set", VolumeMode::Absolute, args.value),
        VolumeCommand::Adjust(args) => ("volume adjust", VolumeMode::Relative, args.delta),
    };
    let settings = ctx.device_settings()?;

    runtime()?.block_on(async {
        let (controller, _feedback) = ctx.start_controller(settings);
        let result = controller.set_volume(mode, value).await;
        let ack = Ack::from_result(&result);
        controller.pool().shutdown().await;

        let dispatch = result.map_err(|err| control_error(&format!("{name} failed"), err))?;
        print_command(name, ack, Some(dispatch), &controller.snapshot(), ctx.format);
        Ok::<_, CliError>(SUCCESS)
    })
}
