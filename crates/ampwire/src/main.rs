mod cmd;
mod exit;
mod logging;
mod output;
mod store;

use std::path::PathBuf;

use ampwire_session::DEFAULT_PORT;
use clap::Parser;

use crate::cmd::{Command, RunContext, ScaleArg};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ampwire", version, about = "Networked amplifier control CLI")]
struct Cli {
    /// Device settings file (JSON).
    #[arg(
        long,
        value_name = "FILE",
        env = "AMPWIRE_CONFIG",
        default_value = "ampwire.json",
        global = true
    )]
    config: PathBuf,

    /// Device IPv4 address. Overrides the settings file.
    #[arg(long, value_name = "ADDR", global = true)]
    ip: Option<String>,

    /// Device TCP port.
    #[arg(long, default_value_t = DEFAULT_PORT, global = true)]
    port: u16,

    /// Control volume scale.
    #[arg(long, value_enum, default_value = "native", global = true)]
    scale: ScaleArg,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "AMPWIRE_LOG",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let ctx = RunContext {
        config: cli.config,
        ip: cli.ip,
        port: cli.port,
        scale: cli.scale.into(),
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
    };
    let result = cmd::run(cli.command, &ctx);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
