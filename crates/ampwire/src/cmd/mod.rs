use std::path::PathBuf;
use std::sync::Arc;

use ampwire_session::{
    ControllerConfig, DeviceContext, InputSource, PoolConfig, Settings, VolumeController,
    VolumeScale,
};
use clap::{Args, Subcommand, ValueEnum};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use crate::exit::{config_error, io_error, CliResult};
use crate::output::OutputFormat;
use crate::store;

pub mod config;
pub mod decode;
pub mod monitor;
pub mod mute;
pub mod source;
pub mod version;
pub mod volume;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Set or adjust the amplifier volume.
    #[command(subcommand)]
    Volume(VolumeCommand),
    /// Select the amplifier input.
    Source(SourceArgs),
    /// Mute or unmute the amplifier.
    Mute(MuteArgs),
    /// Connect and print the device state as feedback arrives.
    Monitor(MonitorArgs),
    /// Show or change the stored device settings.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Decode captured frames given as hex.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Global options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: PathBuf,
    pub ip: Option<String>,
    pub port: u16,
    pub scale: VolumeScale,
    pub format: OutputFormat,
}

impl RunContext {
    /// Stored settings with the `--ip` override applied.
    pub fn settings(&self) -> CliResult<Settings> {
        let mut settings = store::load(&self.config)?;
        if let Some(ip) = &self.ip {
            settings.ip.clone_from(ip);
        }
        Ok(settings)
    }

    /// Settings for talking to the device, rejected before any connect.
    pub fn device_settings(&self) -> CliResult<Settings> {
        let settings = self.settings()?;
        settings
            .socket_addr(self.port)
            .map_err(|err| config_error("device settings", err))?;
        Ok(settings)
    }

    /// Start a controller with its feedback task. Call from within a runtime.
    ///
    /// Each run starts from the stored `initial_volume` rather than the
    /// device's level, so volume requests are always sent.
    pub fn start_controller(&self, settings: Settings) -> (Arc<VolumeController>, JoinHandle<()>) {
        let pool = PoolConfig {
            port: self.port,
            ..PoolConfig::default()
        };
        let config = ControllerConfig {
            scale: self.scale,
            coalesce: false,
            ..ControllerConfig::default()
        };
        VolumeController::start(DeviceContext::new(settings), pool, config)
    }
}

pub fn run(command: Command, ctx: &RunContext) -> CliResult<i32> {
    match command {
        Command::Volume(command) => volume::run(command, ctx),
        Command::Source(args) => source::run(args, ctx),
        Command::Mute(args) => mute::run(args, ctx),
        Command::Monitor(args) => monitor::run(args, ctx),
        Command::Config(command) => config::run(command, ctx),
        Command::Decode(args) => decode::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

pub(crate) fn runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ScaleArg {
    /// 0 to 31, one device step per unit.
    Native,
    /// 0 to 155, five units per device step.
    Legacy,
}

impl From<ScaleArg> for VolumeScale {
    fn from(scale: ScaleArg) -> Self {
        match scale {
            ScaleArg::Native => VolumeScale::Native,
            ScaleArg::Legacy => VolumeScale::Legacy,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum VolumeCommand {
    /// Set an absolute volume.
    Set(VolumeSetArgs),
    /// Change the volume relative to the stored initial volume.
    Adjust(VolumeAdjustArgs),
}

#[derive(Args, Debug)]
pub struct VolumeSetArgs {
    /// Target volume. Clamped to the scale.
    pub value: i32,
}

#[derive(Args, Debug)]
pub struct VolumeAdjustArgs {
    /// Signed change, e.g. 3 or -3.
    #[arg(allow_negative_numbers = true)]
    pub delta: i32,
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Input to select (usb).
    pub input: InputSource,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum MuteState {
    On,
    Off,
}

#[derive(Args, Debug)]
pub struct MuteArgs {
    pub state: MuteState,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Exit after printing N state updates.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the stored settings.
    Show,
    /// Validate and store settings. The address comes from `--ip`.
    Set(ConfigSetArgs),
}

#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// Input selected on the amplifier.
    #[arg(long)]
    pub source: Option<InputSource>,
    /// Volume assumed at startup (0 to 155).
    #[arg(long, allow_negative_numbers = true)]
    pub initial_volume: Option<i32>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex. Spaces, colons and a 0x prefix are accepted.
    #[arg(required = true, num_args = 1..)]
    pub hex: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}
