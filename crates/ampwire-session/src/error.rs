use std::net::SocketAddr;
use std::time::Duration;

/// Settings rejected before any connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No device address has been configured yet.
    #[error("device IP address is not configured")]
    MissingIp,

    /// The address field exceeds the settings record limit.
    #[error("device IP address too long ({len} chars, max {max})")]
    IpTooLong { len: usize, max: usize },

    /// The address is not a dotted-quad IPv4 address.
    #[error("invalid device IP address: {0:?}")]
    InvalidIp(String),

    /// Port zero cannot be dialed.
    #[error("invalid device port: {0}")]
    InvalidPort(u16),

    /// Initial volume outside the settings range.
    #[error("initial volume {value} out of range {min}..={max}")]
    InitialVolumeOutOfRange { value: i32, min: i32, max: i32 },
}

/// Errors raised by device sessions and the connection pool.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Settings do not describe a reachable device.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session is not in the connected state.
    #[error("session not connected")]
    NotConnected,

    /// The TCP connect failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The TCP connect did not complete in time.
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },

    /// Writing a frame failed; the session is faulted.
    #[error("write failed: {0}")]
    Write(#[from] ampwire_frame::ProtocolError),

    /// The frame write did not complete in time.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// Another dispatch held the pool for too long.
    #[error("timed out after {0:?} waiting for the device connection")]
    AcquireTimeout(Duration),
}

/// Errors surfaced to the control surface.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Session or pool failure. Local state is left as is.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Settings were rejected.
    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),

    /// The device protocol has no command for this operation.
    #[error("{0} is not supported by the device protocol")]
    NotSupported(&'static str),
}

pub type Result<T> = std::result::Result<T, SessionError>;
