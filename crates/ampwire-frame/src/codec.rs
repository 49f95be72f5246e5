use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::checksum::checksum;
use crate::error::{ProtocolError, Result};
use crate::payload::{Payload, MIN_PAYLOAD};

/// Frame header: marker (2) + size (1) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Trailing checksum byte.
pub const TRAILER_SIZE: usize = 1;

/// Marker bytes opening every frame.
pub const MARKER: [u8; 2] = [0xFF, 0x55];

/// The size field is a single byte.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Largest payload the device puts on the wire: five bytes for commands,
/// eight for notifications. Stream headers declaring more are treated as
/// noise.
pub const MAX_DEVICE_PAYLOAD: usize = 8;

/// An encoded frame ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Encode a payload into a frame.
    pub fn encode(payload: &[u8]) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len() + TRAILER_SIZE);
        encode_frame(payload, &mut buf)?;
        Ok(Self {
            bytes: buf.freeze(),
        })
    }

    /// Encode a classified payload into a frame.
    pub fn from_payload(payload: &Payload) -> Result<Self> {
        Self::encode(&payload.to_bytes())
    }

    /// The payload slice between header and checksum.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..self.bytes.len() - TRAILER_SIZE]
    }

    /// The trailing checksum byte.
    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// A frame read off the wire whose checksum verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub payload: Payload,
    pub checksum: u8,
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────┬─────────────────┬──────────┐
/// │ Marker (2B)  │ Size     │ Payload         │ Checksum │
/// │ 0xFF 0x55    │ (1B)     │ (Size bytes)    │ (1B)     │
/// └──────────────┴──────────┴─────────────────┴──────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len() + TRAILER_SIZE);
    dst.put_slice(&MARKER);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    dst.put_u8(checksum(payload));
    Ok(())
}

/// Decode one complete frame from the start of `bytes`.
///
/// Bytes after the frame are ignored. Use [`decode_next`] or
/// [`crate::FrameDecoder`] for stream input.
pub fn decode(bytes: &[u8]) -> Result<DecodedFrame> {
    let offset = marker_offset(bytes);
    if offset > 0 {
        return Err(ProtocolError::BadMarker { skipped: offset });
    }
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::Truncated {
            expected: HEADER_SIZE + TRAILER_SIZE,
            available: bytes.len(),
        });
    }
    let total = frame_len(bytes[2]);
    if bytes.len() < total {
        return Err(ProtocolError::Truncated {
            expected: total,
            available: bytes.len(),
        });
    }
    verify_and_classify(&bytes[..total])
}

/// Decode the next frame from a stream buffer.
///
/// Returns `None` if the buffer doesn't contain a complete frame yet. Any
/// outcome other than `None` consumes bytes: a decoded frame, junk skipped up
/// to the next marker, or the first byte of a header that turned out not to
/// open a valid frame. In the last case the rest of the buffer is rescanned,
/// so a spurious `FF 55` cannot swallow or hold back a genuine frame behind it.
pub fn decode_next(src: &mut BytesMut) -> Option<Result<DecodedFrame>> {
    let offset = marker_offset(src);
    if offset > 0 {
        src.advance(offset);
        return Some(Err(ProtocolError::BadMarker { skipped: offset }));
    }

    if src.len() < HEADER_SIZE {
        return None; // Need more data
    }

    let size = src[2] as usize;
    if size > MAX_DEVICE_PAYLOAD {
        src.advance(1);
        return Some(Err(ProtocolError::PayloadTooLarge {
            size,
            max: MAX_DEVICE_PAYLOAD,
        }));
    }
    if size < MIN_PAYLOAD {
        src.advance(1);
        return Some(Err(ProtocolError::PayloadTooShort {
            size,
            min: MIN_PAYLOAD,
        }));
    }

    let total = frame_len(src[2]);
    if src.len() < total {
        return None; // Need more data
    }

    match verify_and_classify(&src[..total]) {
        Ok(frame) => {
            src.advance(total);
            Some(Ok(frame))
        }
        Err(err) => {
            src.advance(1);
            Some(Err(err))
        }
    }
}

fn frame_len(size: u8) -> usize {
    HEADER_SIZE + size as usize + TRAILER_SIZE
}

/// Index of the first byte that could start a marker.
///
/// A lone `0xFF` at the end of the buffer counts, since its partner may still
/// be in flight.
fn marker_offset(src: &[u8]) -> usize {
    (0..src.len())
        .find(|&i| src[i] == MARKER[0] && src.get(i + 1).is_none_or(|&b| b == MARKER[1]))
        .unwrap_or(src.len())
}

fn verify_and_classify(frame: &[u8]) -> Result<DecodedFrame> {
    let payload = &frame[HEADER_SIZE..frame.len() - TRAILER_SIZE];
    let found = frame[frame.len() - 1];
    let expected = checksum(payload);
    if expected != found {
        return Err(ProtocolError::ChecksumMismatch { expected, found });
    }
    Ok(DecodedFrame {
        payload: Payload::parse(payload)?,
        checksum: found,
    })
}
