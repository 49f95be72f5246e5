use std::fs;
use std::io;
use std::path::Path;

use ampwire_session::Settings;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID};

/// Read the settings file. A missing file yields the unconfigured defaults.
pub fn load(path: &Path) -> CliResult<Settings> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Settings::default());
        }
        Err(err) => {
            return Err(io_error(
                &format!("failed reading {}", path.display()),
                err,
            ))
        }
    };
    serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("invalid settings file {}: {err}", path.display()),
        )
    })
}

/// Write the settings file as pretty JSON.
pub fn save(path: &Path, settings: &Settings) -> CliResult<()> {
    let mut text = serde_json::to_string_pretty(settings).map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("failed encoding settings: {err}"),
        )
    })?;
    text.push('\n');
    fs::write(path, text)
        .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?;
    tracing::info!(path = %path.display(), "settings saved");
    Ok(())
}
