use crate::cmd::{runtime, MuteArgs, MuteState, RunContext};
use crate::exit::{control_error, CliError, CliResult, SUCCESS};

/// The device protocol has no mute command; this reports that as a usage
/// error without connecting.
pub fn run(args: MuteArgs, ctx: &RunContext) -> CliResult<i32> {
    let settings = ctx.settings()?;
    let muted = matches!(args.state, MuteState::On);

    runtime()?.block_on(async {
        let (controller, _feedback) = ctx.start_controller(settings);
        controller
            .set_mute(muted)
            .await
            .map_err(|err| control_error("mute failed", err))?;
        Ok::<_, CliError>(SUCCESS)
    })
}
