use std::io::IsTerminal;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use ampwire_frame::{DecodedFrame, Direction};
use ampwire_session::{Ack, DeviceState, Dispatch, Settings};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    command: &'a str,
    ack: Ack,
    /// Device units written, `None` when the request was coalesced.
    sent: Option<u8>,
    state: &'a DeviceState,
    timestamp: String,
}

/// Print the outcome of a control command and the resulting state.
pub fn print_command(
    command: &str,
    ack: Ack,
    dispatch: Option<Dispatch>,
    state: &DeviceState,
    format: OutputFormat,
) {
    let sent = match dispatch {
        Some(Dispatch::Sent { units }) => Some(units),
        _ => None,
    };
    let outcome = match dispatch {
        Some(Dispatch::Sent { units }) => format!("sent ({units})"),
        Some(Dispatch::Coalesced) => "coalesced".to_string(),
        None => "sent".to_string(),
    };
    match format {
        OutputFormat::Json => print_json(&CommandOutput {
            command,
            ack,
            sent,
            state,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "ACK", "OUTCOME", "VOLUME", "SOURCE"])
                .add_row(vec![
                    command.to_string(),
                    ack.to_string(),
                    outcome,
                    state.volume_value.to_string(),
                    state.selected_source.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{command}: {ack} ({outcome}) volume={} range={}..={} source={}",
                state.volume_value, state.volume_min, state.volume_max, state.selected_source
            );
        }
    }
}

#[derive(Serialize)]
struct StateOutput<'a> {
    state: &'a DeviceState,
    timestamp: String,
}

/// Print a device state snapshot.
pub fn print_state(state: &DeviceState, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&StateOutput {
            state,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => println!("{}", state_table(state)),
        OutputFormat::Pretty => {
            println!(
                "volume={} range={}..={} muted={} source={}",
                state.volume_value,
                state.volume_min,
                state.volume_max,
                state.is_muted,
                state.selected_source
            );
        }
    }
}

fn state_table(state: &DeviceState) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["VOLUME", "RANGE", "SOURCE"])
        .add_row(vec![
            state.volume_value.to_string(),
            format!("{}..={}", state.volume_min, state.volume_max),
            state.selected_source.to_string(),
        ]);
    table
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    direction: &'a str,
    code: u8,
    code_name: &'a str,
    value: u8,
    status: u8,
    trailer: String,
    payload_size: usize,
    checksum: u8,
}

/// Print one decoded frame.
pub fn print_frame(frame: &DecodedFrame, format: OutputFormat) {
    let payload = &frame.payload;
    let direction = match payload.direction {
        Direction::Command => "command",
        Direction::Feedback => "feedback",
    };
    match format {
        OutputFormat::Json => print_json(&FrameOutput {
            direction,
            code: payload.code,
            code_name: payload.code_name(),
            value: payload.value,
            status: payload.status,
            trailer: hex(payload.trailer.as_ref()),
            payload_size: payload.len(),
            checksum: frame.checksum,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "DIRECTION", "CODE", "VALUE", "STATUS", "TRAILER", "CHECKSUM",
                ])
                .add_row(vec![
                    direction.to_string(),
                    format!("{:#04x} {}", payload.code, payload.code_name()),
                    payload.value.to_string(),
                    format!("{:#04x}", payload.status),
                    hex(payload.trailer.as_ref()),
                    format!("{:#04x}", frame.checksum),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{direction} code={:#04x} ({}) value={} status={:#04x} trailer=[{}] checksum={:#04x}",
                payload.code,
                payload.code_name(),
                payload.value,
                payload.status,
                hex(payload.trailer.as_ref()),
                frame.checksum
            );
        }
    }
}

#[derive(Serialize)]
struct SettingsOutput<'a> {
    path: String,
    settings: &'a Settings,
}

/// Print the stored settings record.
pub fn print_settings(path: &Path, settings: &Settings, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SettingsOutput {
            path: path.display().to_string(),
            settings,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"])
                .add_row(vec!["path".to_string(), path.display().to_string()])
                .add_row(vec!["ip".to_string(), display_ip(&settings.ip)])
                .add_row(vec!["source".to_string(), settings.source.to_string()])
                .add_row(vec![
                    "initial_volume".to_string(),
                    settings.initial_volume.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{}: ip={} source={} initial_volume={}",
                path.display(),
                display_ip(&settings.ip),
                settings.source,
                settings.initial_volume
            );
        }
    }
}

fn display_ip(ip: &str) -> String {
    if ip.is_empty() {
        "(not configured)".to_string()
    } else {
        ip.to_string()
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Lowercase hex, space separated.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_space_separated() {
        assert_eq!(hex(&[0x00, 0x0a, 0xdb]), "00 0a db");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn frame_output_shape() {
        let frame = ampwire_frame::decode(&[
            0xFF, 0x55, 0x08, 0x2E, 0xA0, 0x05, 0x03, 0x41, 0x00, 0x00, 0xDB, 0x06,
        ])
        .unwrap();
        let out = FrameOutput {
            direction: "feedback",
            code: frame.payload.code,
            code_name: frame.payload.code_name(),
            value: frame.payload.value,
            status: frame.payload.status,
            trailer: hex(frame.payload.trailer.as_ref()),
            payload_size: frame.payload.len(),
            checksum: frame.checksum,
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["code_name"], "VOLUME_DOWN_NOTIFY");
        assert_eq!(json["trailer"], "00 00 db");
        assert_eq!(json["payload_size"], 8);
        assert_eq!(json["checksum"], 6);
    }
}
