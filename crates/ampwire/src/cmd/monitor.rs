use ampwire_session::SessionState;

use crate::cmd::{runtime, MonitorArgs, RunContext};
use crate::exit::{control_error, io_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::print_state;

pub fn run(args: MonitorArgs, ctx: &RunContext) -> CliResult<i32> {
    let settings = ctx.device_settings()?;

    runtime()?.block_on(async {
        let (controller, _feedback) = ctx.start_controller(settings);
        controller
            .connect()
            .await
            .map_err(|err| control_error("connect failed", err))?;
        let Some(session) = controller.pool().current() else {
            return Err(CliError::new(TRANSPORT_ERROR, "device connection was dropped"));
        };
        tracing::info!(addr = %session.addr(), "monitoring device feedback");

        let mut states = controller.subscribe();
        let _ = states.borrow_and_update();
        let mut link = session.subscribe();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let mut printed = 0usize;
        let result: CliResult<i32> = loop {
            if args.count.is_some_and(|count| printed >= count) {
                break Ok(SUCCESS);
            }
            tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() {
                        break Ok(SUCCESS);
                    }
                    let state = states.borrow_and_update().clone();
                    print_state(&state, ctx.format);
                    printed = printed.saturating_add(1);
                }
                _ = link.wait_for(|state| *state != SessionState::Connected) => {
                    break Err(CliError::new(
                        TRANSPORT_ERROR,
                        "device closed the connection",
                    ));
                }
                signal = &mut ctrl_c => {
                    if let Err(err) = signal {
                        break Err(io_error("signal handler setup failed", err));
                    }
                    tracing::debug!("interrupted");
                    break Ok(SUCCESS);
                }
            }
        };

        controller.pool().shutdown().await;
        result
    })
}
