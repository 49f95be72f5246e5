/// Errors that can occur during frame encoding/decoding.
///
/// Decode failures are never fatal to a connection: the stream keeps going and
/// the offending bytes are dropped.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Bytes preceding the next frame marker were discarded.
    #[error("invalid frame marker (expected 0xFF 0x55), skipped {skipped} byte(s)")]
    BadMarker { skipped: usize },

    /// Fewer bytes than the header declares.
    #[error("truncated frame ({available} of {expected} bytes)")]
    Truncated { expected: usize, available: usize },

    /// The trailing checksum byte does not match the payload.
    #[error("checksum mismatch (expected {expected:#04x}, found {found:#04x})")]
    ChecksumMismatch { expected: u8, found: u8 },

    /// The payload does not fit in the one-byte size field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload is too short to carry direction, code, value and status.
    #[error("payload too short ({size} bytes, min {min})")]
    PayloadTooShort { size: usize, min: usize },

    /// The payload prefix is neither a command nor a feedback marker.
    #[error("unknown payload direction {0:02x?}")]
    UnknownDirection([u8; 2]),

    /// An I/O error occurred while writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
