use std::fmt;
use std::io;

use ampwire_frame::ProtocolError;
use ampwire_session::{ConfigError, ControlError, SessionError};

// Exit code constants.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(err.kind()), format!("{context}: {err}"))
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

fn protocol_code(err: &ProtocolError) -> i32 {
    match err {
        ProtocolError::Io(source) => io_code(source.kind()),
        _ => DATA_INVALID,
    }
}

pub fn protocol_error(context: &str, err: ProtocolError) -> CliError {
    CliError::new(protocol_code(&err), format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    let code = match &err {
        SessionError::Config(_) => DATA_INVALID,
        SessionError::Connect { source, .. } => match source.kind() {
            io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
            io::ErrorKind::TimedOut => TIMEOUT,
            _ => TRANSPORT_ERROR,
        },
        SessionError::ConnectTimeout { .. }
        | SessionError::WriteTimeout(_)
        | SessionError::AcquireTimeout(_) => TIMEOUT,
        SessionError::NotConnected => TRANSPORT_ERROR,
        SessionError::Write(err) => protocol_code(err),
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn control_error(context: &str, err: ControlError) -> CliError {
    match err {
        ControlError::Session(err) => session_error(context, err),
        ControlError::Config(err) => config_error(context, err),
        ControlError::NotSupported(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}
