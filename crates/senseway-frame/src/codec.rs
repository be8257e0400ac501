use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_16_IBM_3740};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + transmitter (1) + receiver (1) + message (1) + length (2).
pub const HEADER_SIZE: usize = 7;

/// Frame trailer: CRC-16 (2).
pub const CRC_SIZE: usize = 2;

/// Magic bytes: "SM" (0x53 0x4D).
pub const MAGIC: [u8; 2] = [0x53, 0x4D];

/// Default maximum payload size. Comfortably above the largest bus message
/// (a firmware packet: 240 data bytes + MAC + chunk index).
pub const DEFAULT_MAX_PAYLOAD: usize = 1024;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// One addressed application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Bus address of the sender.
    pub transmitter_id: u8,
    /// Bus address of the addressee.
    pub receiver_id: u8,
    /// Raw message id (see [`crate::MessageId`]).
    pub message_id: u8,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(
        transmitter_id: u8,
        receiver_id: u8,
        message_id: impl Into<u8>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            transmitter_id,
            receiver_id,
            message_id: message_id.into(),
            payload: payload.into(),
        }
    }

    /// Payload length as carried in the header.
    pub fn payload_len(&self) -> u16 {
        self.payload.len() as u16
    }

    /// The total wire size of this frame (header + payload + trailer).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CRC_SIZE
    }
}

/// Stream codec between raw link bytes and [`Frame`]s.
///
/// Decoding is stateful across calls: `src` accumulates bytes as they arrive
/// and the codec consumes complete frames from its front. When `decode`
/// returns an error it must already have consumed at least one byte, so that
/// calling it again makes progress towards the next frame.
pub trait FrameCodec: Send {
    /// Append the wire form of `frame` to `dst`.
    fn encode(&self, frame: &Frame, dst: &mut BytesMut) -> Result<()>;

    /// Decode the next frame from the front of `src`.
    ///
    /// Returns `Ok(None)` if `src` doesn't contain a complete frame yet.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>>;
}

/// Reference codec for the SenseWay wire format.
#[derive(Debug, Clone)]
pub struct SmcomCodec {
    max_payload: usize,
}

impl SmcomCodec {
    /// Create a codec with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Create a codec with an explicit payload limit.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self { max_payload }
    }

    /// Create a codec from frame configuration.
    pub fn from_config(config: &FrameConfig) -> Self {
        Self::with_max_payload(config.max_payload_size)
    }
}

impl Default for SmcomCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec for SmcomCodec {
    fn encode(&self, frame: &Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.max_payload,
            });
        }
        encode_frame(frame, dst)
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.max_payload)
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────┬──────┬──────┬──────────┬──────────┬──────────┐
/// │ Magic 2B  │ TX   │ RX   │ MSG  │ Len 2B LE│ Payload  │ CRC16 LE │
/// │ 0x53 0x4D │ (1B) │ (1B) │ (1B) │          │          │          │
/// └───────────┴──────┴──────┴──────┴──────────┴──────────┴──────────┘
/// ```
///
/// The CRC covers everything between the magic and the trailer.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    if frame.payload.len() > u16::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: frame.payload.len(),
            max: u16::MAX as usize,
        });
    }
    dst.reserve(frame.wire_size());
    let start = dst.len();
    dst.put_slice(&MAGIC);
    dst.put_u8(frame.transmitter_id);
    dst.put_u8(frame.receiver_id);
    dst.put_u8(frame.message_id);
    dst.put_u16_le(frame.payload_len());
    dst.put_slice(&frame.payload);
    let crc = CRC16.checksum(&dst[start + MAGIC.len()..]);
    dst.put_u16_le(crc);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. On error, consumes
/// the offending bytes so the next call resynchronises on the following
/// magic.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.is_empty() {
        return Ok(None);
    }

    // Check magic, tolerating a lone first magic byte at the end of the buffer.
    let magic_ok = src[0] == MAGIC[0] && (src.len() < 2 || src[1] == MAGIC[1]);
    if !magic_ok {
        let discarded = skip_to_next_magic(src);
        return Err(FrameError::InvalidMagic { discarded });
    }

    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let payload_len = u16::from_le_bytes([src[5], src[6]]) as usize;
    if payload_len > max_payload {
        src.advance(1);
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len + CRC_SIZE;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let body_end = HEADER_SIZE + payload_len;
    let computed = CRC16.checksum(&src[MAGIC.len()..body_end]);
    let received = u16::from_le_bytes([src[body_end], src[body_end + 1]]);
    if computed != received {
        src.advance(1);
        return Err(FrameError::ChecksumMismatch { received, computed });
    }

    src.advance(MAGIC.len());
    let transmitter_id = src.get_u8();
    let receiver_id = src.get_u8();
    let message_id = src.get_u8();
    src.advance(2);
    let payload = src.split_to(payload_len).freeze();
    src.advance(CRC_SIZE);

    Ok(Some(Frame {
        transmitter_id,
        receiver_id,
        message_id,
        payload,
    }))
}

fn skip_to_next_magic(src: &mut BytesMut) -> usize {
    let discarded = src[1..]
        .iter()
        .position(|&b| b == MAGIC[0])
        .map_or(src.len(), |pos| pos + 1);
    src.advance(discarded);
    discarded
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 1 KiB.
    pub max_payload_size: usize,
    /// Largest single read from the link.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_chunk_size: 4 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(frame: &Frame) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(frame, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let frame = Frame::new(13, 4, 10u8, Bytes::from_static(&[1, 2, 3]));
        let mut buf = wire(&frame);

        assert_eq!(buf.len(), HEADER_SIZE + 3 + CRC_SIZE);
        assert_eq!(&buf[..2], &MAGIC);

        let decoded = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_known_checksum() {
        // CRC-16/CCITT-FALSE check value for "123456789" is 0x29B1.
        assert_eq!(CRC16.checksum(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x53, 0x4D, 0x01][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_lone_magic_byte_waits() {
        let mut buf = BytesMut::from(&[0x53][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let frame = Frame::new(1, 2, 3u8, Bytes::from_static(b"hello"));
        let mut buf = wire(&frame);
        buf.truncate(HEADER_SIZE + 2);

        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_garbage_before_frame_is_skipped() {
        let frame = Frame::new(1, 2, 3u8, Bytes::from_static(b"ok"));
        let mut buf = BytesMut::from(&[0x00, 0x11, 0x22][..]);
        buf.extend_from_slice(&wire(&frame));

        let err = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap_err();
        assert!(matches!(err, FrameError::InvalidMagic { discarded: 3 }));

        let decoded = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_checksum_mismatch_then_resync() {
        let first = Frame::new(1, 2, 3u8, Bytes::from_static(b"bad"));
        let second = Frame::new(4, 5, 6u8, Bytes::from_static(b"good"));
        let mut buf = wire(&first);
        let corrupt_at = HEADER_SIZE + 1;
        buf[corrupt_at] ^= 0xFF;
        buf.extend_from_slice(&wire(&second));

        let err = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));

        // The decoder drops bytes until it lines up with the next frame.
        let decoded = loop {
            match decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD) {
                Ok(Some(frame)) => break frame,
                Ok(None) => panic!("second frame should be complete"),
                Err(err) => assert!(err.is_decode_error()),
            }
        };
        assert_eq!(decoded, second);
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_slice(&[1, 2, 3]);
        buf.put_u16_le(2048);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge {
                size: 2048,
                max: DEFAULT_MAX_PAYLOAD
            })
        ));
    }

    #[test]
    fn test_codec_rejects_oversized_encode() {
        let codec = SmcomCodec::with_max_payload(4);
        let frame = Frame::new(1, 2, 3u8, vec![0u8; 5]);
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(&frame, &mut buf),
            Err(FrameError::PayloadTooLarge { size: 5, max: 4 })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = wire(&Frame::new(1, 9, 10u8, Bytes::from_static(b"first")));
        buf.extend_from_slice(&wire(&Frame::new(2, 9, 22u8, Bytes::from_static(b"second"))));

        let mut codec = SmcomCodec::new();
        let f1 = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!((f1.transmitter_id, f1.message_id), (1, 10));
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!((f2.transmitter_id, f2.message_id), (2, 22));
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new(13, 255, 10u8, Bytes::new());
        let mut buf = wire(&frame);
        let decoded = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.payload_len(), 0);
        assert_eq!(decoded.receiver_id, 255);
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(1, 2, 3u8, Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4 + CRC_SIZE);
        assert_eq!(wire(&frame).len(), frame.wire_size());
    }
}
