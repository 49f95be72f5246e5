//! Checksum-framed wire codec for networked amplifier control.
//!
//! Every message on the device socket is framed with:
//! - A 2-byte marker (`0xFF 0x55`) for stream synchronization
//! - A 1-byte payload length
//! - The payload: direction marker, command/feedback code, value, status
//! - A 1-byte checksum over the payload
//!
//! Decoding is incremental: feed stream bytes in whatever pieces the socket
//! delivers and complete frames come out. Malformed frames are reported and
//! skipped, never fatal.

pub mod checksum;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod payload;

pub use checksum::checksum;
pub use codec::{
    decode, decode_next, encode_frame, DecodedFrame, Frame, HEADER_SIZE, MARKER,
    MAX_DEVICE_PAYLOAD, MAX_PAYLOAD,
};
#[cfg(feature = "async")]
pub use decoder::DeviceCodec;
pub use decoder::FrameDecoder;
pub use error::{ProtocolError, Result};
pub use payload::{CommandCode, Direction, FeedbackCode, Payload};
