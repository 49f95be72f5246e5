use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ConfigError;

/// TCP port the amplifier listens on.
pub const DEFAULT_PORT: u16 = 1901;

/// Longest accepted address string (dotted-quad IPv4).
pub const MAX_IP_LEN: usize = 15;

/// Range accepted for `initial_volume`, in control-surface units.
pub const INITIAL_VOLUME_MIN: i32 = 0;
pub const INITIAL_VOLUME_MAX: i32 = 155;

const DEFAULT_INITIAL_VOLUME: i32 = 5;

/// Amplifier inputs that can be selected over the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    #[default]
    Usb,
}

impl InputSource {
    /// Value byte carried by a source-select command.
    pub fn code(self) -> u8 {
        match self {
            InputSource::Usb => 0x05,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x05 => Some(InputSource::Usb),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            InputSource::Usb => "usb",
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InputSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usb" => Ok(InputSource::Usb),
            other => Err(format!("unknown input source: {other}")),
        }
    }
}

/// The persisted device settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Device IPv4 address. Empty until configured.
    #[serde(default)]
    pub ip: String,
    /// Input selected on the amplifier.
    #[serde(default)]
    pub source: InputSource,
    /// Volume assumed at startup, before the device reports anything.
    #[serde(default = "default_initial_volume", alias = "initialvolume")]
    pub initial_volume: i32,
}

fn default_initial_volume() -> i32 {
    DEFAULT_INITIAL_VOLUME
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ip: String::new(),
            source: InputSource::default(),
            initial_volume: DEFAULT_INITIAL_VOLUME,
        }
    }
}

impl Settings {
    /// Check every field; the first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ipv4()?;
        if !(INITIAL_VOLUME_MIN..=INITIAL_VOLUME_MAX).contains(&self.initial_volume) {
            return Err(ConfigError::InitialVolumeOutOfRange {
                value: self.initial_volume,
                min: INITIAL_VOLUME_MIN,
                max: INITIAL_VOLUME_MAX,
            });
        }
        Ok(())
    }

    /// Parsed device address.
    pub fn ipv4(&self) -> Result<Ipv4Addr, ConfigError> {
        if self.ip.is_empty() {
            return Err(ConfigError::MissingIp);
        }
        if self.ip.len() > MAX_IP_LEN {
            return Err(ConfigError::IpTooLong {
                len: self.ip.len(),
                max: MAX_IP_LEN,
            });
        }
        self.ip
            .parse()
            .map_err(|_| ConfigError::InvalidIp(self.ip.clone()))
    }

    /// Socket address of the device on `port`.
    pub fn socket_addr(&self, port: u16) -> Result<SocketAddr, ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        Ok(SocketAddr::from((self.ipv4()?, port)))
    }
}

/// Shared, explicitly passed settings holder.
///
/// Built once at startup, updated when the settings collaborator saves a new
/// record, and read by the pool at each connect.
#[derive(Clone)]
pub struct DeviceContext {
    settings: Arc<watch::Sender<Settings>>,
}

impl DeviceContext {
    /// Wrap initial settings. They are not validated here so an unconfigured
    /// record (empty IP) can still back a context.
    pub fn new(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self {
            settings: Arc::new(tx),
        }
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    /// Validate and store new settings.
    pub fn update(&self, settings: Settings) -> Result<(), ConfigError> {
        settings.validate()?;
        self.settings.send_replace(settings);
        Ok(())
    }

    /// Observe settings changes.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.settings.subscribe()
    }
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("settings", &*self.settings.borrow())
            .finish()
    }
}
