use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Crates whose events follow `--log-level`. Everything else (tokio and
/// friends) is capped at warn.
const AMPWIRE_TARGETS: [&str; 3] = ["ampwire", "ampwire_frame", "ampwire_session"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn target_filter(level: LevelFilter) -> Targets {
    AMPWIRE_TARGETS
        .iter()
        .fold(Targets::new(), |targets, target| {
            targets.with_target(*target, level)
        })
        .with_default(level.min(LevelFilter::WARN))
}

/// Install the stderr subscriber. Library crates log through `tracing` only.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = target_filter(level.as_filter());
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false);

    let _ = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json())
            .with(filter)
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn own_crates_follow_requested_level() {
        let filter = target_filter(LevelFilter::DEBUG);
        assert!(filter.would_enable("ampwire_session::pool", &Level::DEBUG));
        assert!(filter.would_enable("ampwire_frame::decoder", &Level::DEBUG));
        assert!(filter.would_enable("ampwire::cmd::monitor", &Level::DEBUG));
        assert!(!filter.would_enable("ampwire_session::pool", &Level::TRACE));
    }

    #[test]
    fn dependencies_are_capped_at_warn() {
        let filter = target_filter(LevelFilter::TRACE);
        assert!(!filter.would_enable("tokio::runtime", &Level::INFO));
        assert!(filter.would_enable("tokio::runtime", &Level::WARN));

        let quiet = target_filter(LevelFilter::ERROR);
        assert!(!quiet.would_enable("tokio::runtime", &Level::WARN));
        assert!(!quiet.would_enable("ampwire_session", &Level::WARN));
    }
}
