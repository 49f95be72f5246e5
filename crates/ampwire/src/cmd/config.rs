use ampwire_session::Settings;

use crate::cmd::{ConfigCommand, ConfigSetArgs, RunContext};
use crate::exit::{config_error, CliResult, SUCCESS};
use crate::output::print_settings;
use crate::store;

pub fn run(command: ConfigCommand, ctx: &RunContext) -> CliResult<i32> {
    match command {
        ConfigCommand::Show => {
            let settings = store::load(&ctx.config)?;
            print_settings(&ctx.config, &settings, ctx.format);
            Ok(SUCCESS)
        }
        ConfigCommand::Set(args) => {
            let settings = updated(store::load(&ctx.config)?, ctx, &args);
            // Rejected records are never written, matching the NotValid ack.
            settings
                .validate()
                .map_err(|err| config_error("settings rejected", err))?;
            store::save(&ctx.config, &settings)?;
            print_settings(&ctx.config, &settings, ctx.format);
            Ok(SUCCESS)
        }
    }
}

fn updated(mut settings: Settings, ctx: &RunContext, args: &ConfigSetArgs) -> Settings {
    if let Some(ip) = &ctx.ip {
        settings.ip.clone_from(ip);
    }
    if let Some(source) = args.source {
        settings.source = source;
    }
    if let Some(initial_volume) = args.initial_volume {
        settings.initial_volume = initial_volume;
    }
    settings
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ampwire_session::{InputSource, VolumeScale};

    use super::*;
    use crate::output::OutputFormat;

    fn ctx(ip: Option<&str>) -> RunContext {
        RunContext {
            config: PathBuf::from("unused.json"),
            ip: ip.map(str::to_string),
            port: 1901,
            scale: VolumeScale::Native,
            format: OutputFormat::Json,
        }
    }

    #[test]
    fn only_given_fields_change() {
        let stored = Settings {
            ip: "10.0.0.2".to_string(),
            source: InputSource::Usb,
            initial_volume: 20,
        };
        let args = ConfigSetArgs {
            source: None,
            initial_volume: Some(35),
        };

        let next = updated(stored.clone(), &ctx(None), &args);
        assert_eq!(next.ip, "10.0.0.2");
        assert_eq!(next.initial_volume, 35);

        let next = updated(stored, &ctx(Some("10.0.0.7")), &args);
        assert_eq!(next.ip, "10.0.0.7");
    }
}
