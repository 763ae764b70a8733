//! Frame encoding/decoding.
//!
//! Each direction of the link carries length-prefixed frames:
//!
//! ```text
//! +-------+--------+--------+-------------------+
//! | start | len_lo | len_hi | payload[0..len]   |
//! +-------+--------+--------+-------------------+
//! ```
//!
//! The start byte is `'<'` for host → device and `'>'` for device → host.
//! The decoder tolerates partial arrivals (it buffers until a complete frame
//! is available) and corrupt input: bytes that do not begin a recognizable
//! frame are discarded up to the next `'>'`, and an oversized length field is
//! reported as a [`ProtocolError`] without terminating the stream.

use bytes::{Buf, BufMut, BytesMut};

use crate::constants::{FRAME_START_RX, FRAME_START_TX, MAX_FRAME_SIZE};
use crate::error::ProtocolError;

/// Streaming decoder/encoder for the serial framing.
///
/// One codec instance per connection; [`FrameCodec::clear`] restarts it.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        FrameCodec {
            buffer: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next device → host frame from the buffer.
    ///
    /// Returns `None` when more data is needed. Returns
    /// `Some(Err(ProtocolError))` for a corrupt frame header; the codec has
    /// already resynchronized past it and the next call continues decoding.
    pub fn decode(&mut self) -> Option<Result<Vec<u8>, ProtocolError>> {
        loop {
            // Scan for the '>' start byte, discarding any preceding garbage.
            let skipped = self.skip_to_frame_start();
            if skipped > 0 {
                log::trace!("codec: discarded {} garbage bytes before frame start", skipped);
            }

            // Need at least start + 2 length bytes.
            if self.buffer.len() < 3 {
                return None;
            }

            let len = u16::from_le_bytes([self.buffer[1], self.buffer[2]]) as usize;
            if len > MAX_FRAME_SIZE {
                // Corrupt length field. Drop the start byte and rescan so a
                // later legitimate '>' is found, then let observers know.
                self.buffer.advance(1);
                return Some(Err(ProtocolError::FrameTooLong {
                    max: MAX_FRAME_SIZE,
                    actual: len,
                }));
            }
            if len == 0 {
                // Empty frames carry no code byte and cannot be classified.
                self.buffer.advance(3);
                return Some(Err(ProtocolError::FrameTooShort {
                    expected: 1,
                    actual: 0,
                }));
            }

            // Wait for the whole payload.
            if self.buffer.len() < 3 + len {
                return None;
            }

            self.buffer.advance(3);
            let frame = self.buffer.split_to(len).to_vec();
            return Some(Ok(frame));
        }
    }

    /// Encode a payload with the host → device start byte and length prefix.
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u16;
        let mut buf = Vec::with_capacity(3 + payload.len());
        buf.push(FRAME_START_TX);
        buf.put_u16_le(len);
        buf.extend_from_slice(payload);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer, restarting the decoder.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn skip_to_frame_start(&mut self) -> usize {
        let mut skipped = 0;
        while !self.buffer.is_empty() && self.buffer[0] != FRAME_START_RX {
            self.buffer.advance(1);
            skipped += 1;
        }
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to frame a payload as the device would (with '>' start byte).
    fn frame_from_device(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + payload.len());
        buf.push(FRAME_START_RX);
        buf.put_u16_le(payload.len() as u16);
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_encode_shape() {
        let encoded = FrameCodec::encode(b"hello");
        assert_eq!(encoded[0], FRAME_START_TX);
        assert_eq!(encoded[1], 5);
        assert_eq!(encoded[2], 0);
        assert_eq!(&encoded[3..], b"hello");
    }

    #[test]
    fn test_decode_complete_frame() {
        let mut codec = FrameCodec::new();
        codec.push(&frame_from_device(b"payload"));
        let frame = codec.decode().expect("frame available").expect("valid");
        assert_eq!(&frame, b"payload");
        assert!(codec.decode().is_none());
    }

    #[test]
    fn test_decode_partial_arrivals() {
        let mut codec = FrameCodec::new();
        let wire = frame_from_device(b"split across reads");

        codec.push(&wire[..2]);
        assert!(codec.decode().is_none());
        codec.push(&wire[2..7]);
        assert!(codec.decode().is_none());
        codec.push(&wire[7..]);
        let frame = codec.decode().expect("frame available").expect("valid");
        assert_eq!(&frame, b"split across reads");
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut codec = FrameCodec::new();
        let mut wire = frame_from_device(b"first");
        wire.extend_from_slice(&frame_from_device(b"second"));
        codec.push(&wire);

        assert_eq!(codec.decode().unwrap().unwrap(), b"first");
        assert_eq!(codec.decode().unwrap().unwrap(), b"second");
        assert!(codec.decode().is_none());
    }

    #[test]
    fn test_decode_skips_leading_garbage() {
        let mut codec = FrameCodec::new();
        let mut wire = vec![0x00, 0x42, 0x13];
        wire.extend_from_slice(&frame_from_device(b"clean"));
        codec.push(&wire);

        let frame = codec.decode().expect("frame available").expect("valid");
        assert_eq!(&frame, b"clean");
    }

    #[test]
    fn test_decode_resyncs_after_bad_length() {
        let mut codec = FrameCodec::new();
        // '>' followed by an absurd length, then a valid frame.
        let mut wire = vec![FRAME_START_RX, 0xFF, 0xFF];
        wire.extend_from_slice(&frame_from_device(b"survivor"));
        codec.push(&wire);

        match codec.decode() {
            Some(Err(ProtocolError::FrameTooLong { actual, .. })) => {
                assert_eq!(actual, 0xFFFF);
            }
            other => panic!("expected FrameTooLong, got {:?}", other),
        }
        // The stream continues with the next valid frame.
        let frame = codec.decode().expect("frame available").expect("valid");
        assert_eq!(&frame, b"survivor");
    }

    #[test]
    fn test_decode_rejects_empty_frame() {
        let mut codec = FrameCodec::new();
        let mut wire = vec![FRAME_START_RX, 0x00, 0x00];
        wire.extend_from_slice(&frame_from_device(b"next"));
        codec.push(&wire);

        assert!(matches!(
            codec.decode(),
            Some(Err(ProtocolError::FrameTooShort { .. }))
        ));
        assert_eq!(codec.decode().unwrap().unwrap(), b"next");
    }

    #[test]
    fn test_trailing_bytes_retained() {
        let mut codec = FrameCodec::new();
        let mut wire = frame_from_device(b"whole");
        let next = frame_from_device(b"tail");
        wire.extend_from_slice(&next[..2]);
        codec.push(&wire);

        assert_eq!(codec.decode().unwrap().unwrap(), b"whole");
        assert!(codec.decode().is_none());
        codec.push(&next[2..]);
        assert_eq!(codec.decode().unwrap().unwrap(), b"tail");
    }
}
