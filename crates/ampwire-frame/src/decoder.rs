use bytes::BytesMut;

use crate::codec::{decode_next, DecodedFrame};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Accumulates stream bytes and yields complete frames.
///
/// TCP delivers the device's frames with arbitrary segment boundaries; push
/// whatever arrived and drain with [`FrameDecoder::next_frame`] until it
/// returns `None`.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next decode outcome, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Result<DecodedFrame>> {
        decode_next(&mut self.buf)
    }

    /// Bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial frame.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "async")]
mod device_codec {
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    use crate::codec::{decode_next, encode_frame, DecodedFrame};
    use crate::error::ProtocolError;
    use crate::payload::Payload;

    /// `tokio_util` codec for the device stream.
    ///
    /// Items are themselves results: a malformed frame is handed to the caller
    /// as `Ok(Some(Err(..)))` so `FramedRead` keeps running. Only transport
    /// errors end the stream.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct DeviceCodec;

    impl DeviceCodec {
        pub fn new() -> Self {
            Self
        }
    }

    impl Decoder for DeviceCodec {
        type Item = Result<DecodedFrame, ProtocolError>;
        type Error = std::io::Error;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            Ok(decode_next(src))
        }

        fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            if let Some(item) = decode_next(src) {
                return Ok(Some(item));
            }
            if !src.is_empty() {
                tracing::debug!(bytes = src.len(), "dropping partial frame at end of stream");
                src.clear();
            }
            Ok(None)
        }
    }

    impl Encoder<Payload> for DeviceCodec {
        type Error = ProtocolError;

        fn encode(&mut self, item: Payload, dst: &mut BytesMut) -> Result<(), Self::Error> {
            encode_frame(&item.to_bytes(), dst)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::payload::{CommandCode, FeedbackCode};

        #[test]
        fn encoder_writes_framed_payload() {
            let mut dst = BytesMut::new();
            DeviceCodec::new()
                .encode(Payload::command(CommandCode::VolumeUp, 1, 0x51), &mut dst)
                .unwrap();
            assert_eq!(
                dst.as_ref(),
                &[0xFF, 0x55, 0x05, 0x2F, 0xA0, 0x13, 0x01, 0x51, 199]
            );
        }

        #[test]
        fn decoder_surfaces_protocol_errors_as_items() {
            let mut codec = DeviceCodec::new();
            let mut src = BytesMut::from(&[0x00, 0x00][..]);
            encode_frame(
                &Payload::feedback(FeedbackCode::VolumeDownNotify, 3, 0x41).to_bytes(),
                &mut src,
            )
            .unwrap();

            let first = codec.decode(&mut src).unwrap().unwrap();
            assert!(matches!(first, Err(ProtocolError::BadMarker { skipped: 2 })));
            let second = codec.decode(&mut src).unwrap().unwrap().unwrap();
            assert_eq!(second.payload.value, 3);
            assert!(codec.decode(&mut src).unwrap().is_none());
        }

        #[test]
        fn decode_eof_drops_partial_frame() {
            let mut codec = DeviceCodec::new();
            let mut src = BytesMut::from(&[0xFF, 0x55, 0x05, 0x2E][..]);
            assert!(codec.decode_eof(&mut src).unwrap().is_none());
            assert!(src.is_empty());
        }
    }
}

#[cfg(feature = "async")]
pub use device_codec::DeviceCodec;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;
    use crate::error::ProtocolError;
    use crate::payload::{CommandCode, Direction, FeedbackCode, Payload};

    fn drain(decoder: &mut FrameDecoder) -> Vec<Result<DecodedFrame>> {
        std::iter::from_fn(|| decoder.next_frame()).collect()
    }

    #[test]
    fn every_chunk_size_yields_exactly_one_frame() {
        let payloads = [
            Payload::command(CommandCode::VolumeUp, 10, 0x51),
            Payload::feedback(FeedbackCode::VolumeUpNotify, 7, 0x51),
            Payload::feedback(FeedbackCode::VolumeDownNotify, 3, 0x41)
                .with_trailer(vec![0x00, 0x00, 0xDB]),
        ];

        for payload in payloads {
            let wire = Frame::from_payload(&payload).unwrap().into_bytes();
            for chunk in 1..=wire.len() {
                let mut decoder = FrameDecoder::new();
                let mut frames = Vec::new();
                for piece in wire.chunks(chunk) {
                    decoder.push(piece);
                    frames.extend(drain(&mut decoder));
                }
                assert_eq!(frames.len(), 1, "chunk size {chunk}");
                assert_eq!(frames[0].as_ref().unwrap().payload, payload);
                assert_eq!(decoder.buffered(), 0);
            }
        }
    }

    #[test]
    fn every_split_point_yields_exactly_one_frame() {
        let wire = Frame::from_payload(&Payload::feedback(FeedbackCode::VolumeUpNotify, 7, 0x51))
            .unwrap()
            .into_bytes();

        for split in 0..=wire.len() {
            let mut decoder = FrameDecoder::new();
            decoder.push(&wire[..split]);
            let mut frames = drain(&mut decoder);
            decoder.push(&wire[split..]);
            frames.extend(drain(&mut decoder));
            assert_eq!(frames.len(), 1, "split at {split}");
            assert!(frames[0].is_ok());
        }
    }

    #[test]
    fn back_to_back_frames_in_one_segment() {
        let mut decoder = FrameDecoder::new();
        for value in [1u8, 2, 3] {
            let frame = Frame::from_payload(&Payload::command(CommandCode::VolumeUp, value, 0x51))
                .unwrap();
            decoder.push(frame.as_bytes());
        }

        let values: Vec<u8> = drain(&mut decoder)
            .into_iter()
            .map(|frame| frame.unwrap().payload.value)
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn corrupted_frame_does_not_stall_the_stream() {
        let good = Frame::from_payload(&Payload::feedback(FeedbackCode::VolumeDownNotify, 9, 0x51))
            .unwrap();
        let mut bad = good.as_bytes().to_vec();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        let mut decoder = FrameDecoder::new();
        decoder.push(b"noise");
        decoder.push(&bad);
        decoder.push(good.as_bytes());

        let outcomes = drain(&mut decoder);
        assert_eq!(outcomes.len(), 4);
        assert!(matches!(outcomes[0], Err(ProtocolError::BadMarker { skipped: 5 })));
        assert!(matches!(outcomes[1], Err(ProtocolError::ChecksumMismatch { .. })));
        assert!(matches!(outcomes[2], Err(ProtocolError::BadMarker { skipped: 8 })));
        let decoded = outcomes[3].as_ref().unwrap();
        assert_eq!(decoded.payload.direction, Direction::Feedback);
        assert_eq!(decoded.payload.value, 9);
    }

    #[test]
    fn spurious_header_before_quiet_feedback_is_not_stalled() {
        let captured = [
            0xFF, 0x55, 0x08, 0x2E, 0xA0, 0x05, 0x03, 0x41, 0x00, 0x00, 0xDB, 0x06,
        ];
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0xFF, 0x55, 0xFF]);
        decoder.push(&captured);

        let outcomes = drain(&mut decoder);
        let frames: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.feedback_code(), Some(FeedbackCode::VolumeDownNotify));
        assert_eq!(frames[0].payload.value, 3);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn clear_discards_partial_frame() {
        let mut decoder = FrameDecoder::default();
        decoder.push(&[0xFF, 0x55, 0x05]);
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.buffered(), 3);
        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
    }
}
