//! Payload checksum.
//!
//! The device computes `ceil(sum/255)*255 - sum - (n - ceil(sum/255))` over the
//! payload bytes. For some payloads (e.g. all zeroes) that expression goes
//! negative, so the result is reduced into `0..=255` before it goes on the
//! wire. After reduction the frame satisfies
//! `(n + sum(payload) + checksum) % 256 == 0`, i.e. the size byte, the payload
//! and the checksum sum to zero modulo 256.

/// Compute the checksum byte for a payload.
pub fn checksum(payload: &[u8]) -> u8 {
    let len = payload.len() as i64;
    let sum: i64 = payload.iter().map(|&b| i64::from(b)).sum();
    let blocks = (sum + 254) / 255;
    let raw = blocks * 255 - sum - (len - blocks);
    raw.rem_euclid(256) as u8
}

/// Returns true if `found` is the checksum of `payload`.
pub fn verify(payload: &[u8], found: u8) -> bool {
    checksum(payload) == found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation_holds(payload: &[u8]) -> bool {
        let sum: usize = payload.iter().map(|&b| b as usize).sum();
        (payload.len() + sum + checksum(payload) as usize) % 256 == 0
    }

    #[test]
    fn matches_captured_feedback_frames() {
        // ff5508 2ea0 0404 4100 00db 06
        assert_eq!(
            checksum(&[0x2E, 0xA0, 0x04, 0x04, 0x41, 0x00, 0x00, 0xDB]),
            0x06
        );
        // ff5508 2ea0 0503 4100 00db 06
        assert_eq!(
            checksum(&[0x2E, 0xA0, 0x05, 0x03, 0x41, 0x00, 0x00, 0xDB]),
            0x06
        );
    }

    #[test]
    fn command_payload_checksum() {
        // sum = 308, two blocks: 510 - 308 - 3
        assert_eq!(checksum(&[0x2F, 0xA0, 0x13, 0x01, 0x51]), 199);
    }

    #[test]
    fn negative_raw_value_is_normalized() {
        // raw formula yields -5 for five zero bytes
        assert_eq!(checksum(&[0, 0, 0, 0, 0]), 251);
        assert!(relation_holds(&[0, 0, 0, 0, 0]));
    }

    #[test]
    fn relation_holds_across_volume_and_status_values() {
        for code in [0x13u8, 0x14, 0x15] {
            for value in 0..=u8::MAX {
                for status in [0x00u8, 0x41, 0x51, 0xFF] {
                    let payload = [0x2F, 0xA0, code, value, status];
                    assert!(relation_holds(&payload), "payload {payload:02x?}");
                }
            }
        }
    }

    #[test]
    fn relation_holds_for_edge_payloads() {
        assert!(relation_holds(&[]));
        assert!(relation_holds(&[0xFF]));
        assert!(relation_holds(&[0xFF; 255]));
        assert!(relation_holds(&[0x01; 7]));
    }

    #[test]
    fn verify_rejects_wrong_byte() {
        let payload = [0x2E, 0xA0, 0x04, 0x07, 0x51];
        let good = checksum(&payload);
        assert!(verify(&payload, good));
        assert!(!verify(&payload, good.wrapping_add(1)));
    }
}
