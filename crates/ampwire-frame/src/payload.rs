//! Payload layout and protocol codes.
//!
//! ```text
//! ┌──────────┬──────┬──────┬───────┬────────┬──────────────┐
//! │ Dir (1B) │ 0xA0 │ Code │ Value │ Status │ Trailer ...  │
//! └──────────┴──────┴──────┴───────┴────────┴──────────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// Second byte of every payload.
pub const DIRECTION_SUFFIX: u8 = 0xA0;

/// First payload byte of host-to-device commands.
pub const COMMAND_PREFIX: u8 = 0x2F;

/// First payload byte of device-to-host feedback.
pub const FEEDBACK_PREFIX: u8 = 0x2E;

/// Direction, code, value and status.
pub const MIN_PAYLOAD: usize = 5;

/// Which way a payload travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host to device.
    Command,
    /// Device to host.
    Feedback,
}

impl Direction {
    /// The two-byte marker that opens the payload.
    pub fn prefix(self) -> [u8; 2] {
        match self {
            Direction::Command => [COMMAND_PREFIX, DIRECTION_SUFFIX],
            Direction::Feedback => [FEEDBACK_PREFIX, DIRECTION_SUFFIX],
        }
    }

    /// Classify a payload by its two-byte marker.
    pub fn from_prefix(prefix: [u8; 2]) -> Option<Self> {
        match prefix {
            [COMMAND_PREFIX, DIRECTION_SUFFIX] => Some(Direction::Command),
            [FEEDBACK_PREFIX, DIRECTION_SUFFIX] => Some(Direction::Feedback),
            _ => None,
        }
    }
}

/// Host-to-device command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    VolumeUp = 0x13,
    VolumeDown = 0x14,
    SourceSelect = 0x15,
}

impl CommandCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x13 => Some(Self::VolumeUp),
            0x14 => Some(Self::VolumeDown),
            0x15 => Some(Self::SourceSelect),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::VolumeUp => "VOLUME_UP",
            Self::VolumeDown => "VOLUME_DOWN",
            Self::SourceSelect => "SOURCE_SELECT",
        }
    }
}

/// Device-to-host notification codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FeedbackCode {
    VolumeUpNotify = 0x04,
    VolumeDownNotify = 0x05,
}

impl FeedbackCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x04 => Some(Self::VolumeUpNotify),
            0x05 => Some(Self::VolumeDownNotify),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::VolumeUpNotify => "VOLUME_UP_NOTIFY",
            Self::VolumeDownNotify => "VOLUME_DOWN_NOTIFY",
        }
    }
}

/// A classified protocol payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub direction: Direction,
    pub code: u8,
    pub value: u8,
    pub status: u8,
    /// Bytes after the status byte. Empty for commands; the device appends
    /// three opaque bytes to its notifications.
    pub trailer: Bytes,
}

impl Payload {
    /// Build a five-byte command payload.
    pub fn command(code: CommandCode, value: u8, status: u8) -> Self {
        Self {
            direction: Direction::Command,
            code: code as u8,
            value,
            status,
            trailer: Bytes::new(),
        }
    }

    /// Build a feedback payload (used by device simulators and tests).
    pub fn feedback(code: FeedbackCode, value: u8, status: u8) -> Self {
        Self {
            direction: Direction::Feedback,
            code: code as u8,
            value,
            status,
            trailer: Bytes::new(),
        }
    }

    /// Attach trailing bytes after the status byte.
    pub fn with_trailer(mut self, trailer: impl Into<Bytes>) -> Self {
        self.trailer = trailer.into();
        self
    }

    /// Parse and classify raw payload bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_PAYLOAD {
            return Err(ProtocolError::PayloadTooShort {
                size: bytes.len(),
                min: MIN_PAYLOAD,
            });
        }
        let prefix = [bytes[0], bytes[1]];
        let direction =
            Direction::from_prefix(prefix).ok_or(ProtocolError::UnknownDirection(prefix))?;

        Ok(Self {
            direction,
            code: bytes[2],
            value: bytes[3],
            status: bytes[4],
            trailer: Bytes::copy_from_slice(&bytes[MIN_PAYLOAD..]),
        })
    }

    /// Number of payload bytes on the wire.
    pub fn len(&self) -> usize {
        MIN_PAYLOAD + self.trailer.len()
    }

    /// A payload always carries at least the five semantic bytes.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Serialize the payload into `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.len());
        dst.put_slice(&self.direction.prefix());
        dst.put_u8(self.code);
        dst.put_u8(self.value);
        dst.put_u8(self.status);
        dst.put_slice(&self.trailer);
    }

    /// Serialize the payload into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    pub fn command_code(&self) -> Option<CommandCode> {
        match self.direction {
            Direction::Command => CommandCode::from_u8(self.code),
            Direction::Feedback => None,
        }
    }

    pub fn feedback_code(&self) -> Option<FeedbackCode> {
        match self.direction {
            Direction::Feedback => FeedbackCode::from_u8(self.code),
            Direction::Command => None,
        }
    }

    /// Human-readable code name for logs and CLI output.
    pub fn code_name(&self) -> &'static str {
        self.command_code()
            .map(CommandCode::name)
            .or_else(|| self.feedback_code().map(FeedbackCode::name))
            .unwrap_or("UNKNOWN")
    }
}
