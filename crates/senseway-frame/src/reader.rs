use bytes::BytesMut;
use senseway_transport::SerialLink;

use crate::codec::{Frame, FrameCodec, FrameConfig};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Reassembles frames from the reader half of a link.
///
/// Bytes are pulled with [`FrameReader::fill`] and frames taken out with
/// [`FrameReader::next_frame`]; the two steps are separate so the caller can
/// decide what to do with malformed input without losing link errors.
pub struct FrameReader {
    link: Box<dyn SerialLink>,
    codec: Box<dyn FrameCodec>,
    buf: BytesMut,
    config: FrameConfig,
}

impl FrameReader {
    /// Create a frame reader with default configuration.
    pub fn new(link: Box<dyn SerialLink>, codec: Box<dyn FrameCodec>) -> Self {
        Self::with_config(link, codec, FrameConfig::default())
    }

    /// Create a frame reader with explicit configuration.
    pub fn with_config(
        link: Box<dyn SerialLink>,
        codec: Box<dyn FrameCodec>,
        config: FrameConfig,
    ) -> Self {
        Self {
            link,
            codec,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read whatever the link has, waiting at most the link's read timeout.
    ///
    /// Returns the number of bytes appended to the decode buffer; zero means
    /// the link was idle.
    pub fn fill(&mut self) -> Result<usize> {
        let available = self.link.bytes_available()?;
        let want = available.clamp(1, self.config.read_chunk_size.max(1));

        let mut chunk = vec![0u8; want];
        let read = self.link.read(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..read]);
        Ok(read)
    }

    /// Decode the next buffered frame.
    ///
    /// Returns `Ok(None)` once the buffer holds no complete frame. A decode
    /// error means malformed bytes were dropped; calling again continues with
    /// the remaining input.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.codec.decode(&mut self.buf)
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying link.
    pub fn link(&self) -> &dyn SerialLink {
        self.link.as_ref()
    }
}

impl std::fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("link", &self.link.name())
            .field("buffered", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use bytes::Bytes;
    use senseway_transport::MockLink;

    use super::*;
    use crate::codec::{encode_frame, SmcomCodec};
    use crate::error::FrameError;

    fn reader_for(link: &MockLink) -> FrameReader {
        FrameReader::new(Box::new(link.clone()), Box::new(SmcomCodec::new()))
    }

    fn wire(frame: &Frame) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(frame, &mut buf).unwrap();
        buf.to_vec()
    }

    fn drain(reader: &mut FrameReader) -> (Vec<Frame>, usize) {
        let mut frames = Vec::new();
        let mut errors = 0;
        loop {
            match reader.next_frame() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => return (frames, errors),
                Err(_) => errors += 1,
            }
        }
    }

    #[test]
    fn read_single_frame() {
        let link = MockLink::new();
        let frame = Frame::new(4, 13, 10u8, Bytes::from_static(&[3, 1, 7]));
        link.inject(&wire(&frame));

        let mut reader = reader_for(&link);
        assert!(reader.fill().unwrap() > 0);
        assert_eq!(reader.next_frame().unwrap(), Some(frame));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn idle_link_fills_nothing() {
        let link = MockLink::new();
        let mut reader = reader_for(&link);
        assert_eq!(reader.fill().unwrap(), 0);
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn partial_frames_are_reassembled() {
        let link = MockLink::new();
        let frame = Frame::new(4, 13, 22u8, vec![0xAB; 64]);
        let bytes = wire(&frame);
        let mut reader = reader_for(&link);

        for piece in bytes.chunks(5) {
            link.inject(piece);
            reader.fill().unwrap();
        }

        assert_eq!(drain(&mut reader), (vec![frame], 0));
    }

    #[test]
    fn noise_between_frames_is_dropped() {
        let link = MockLink::new();
        let first = Frame::new(1, 13, 10u8, Bytes::from_static(b"one"));
        let second = Frame::new(2, 13, 11u8, Bytes::from_static(b"two"));
        link.inject(&wire(&first));
        link.inject(&[0x00, 0xFF, 0x10]);
        link.inject(&wire(&second));

        let mut reader = reader_for(&link);
        reader.fill().unwrap();
        let (frames, errors) = drain(&mut reader);

        assert_eq!(frames, vec![first, second]);
        assert_eq!(errors, 1);
    }

    #[test]
    fn zero_read_chunk_size_reads_a_byte_at_a_time() {
        let link = MockLink::new();
        let frame = Frame::new(4, 13, 10u8, Bytes::from_static(&[3, 1, 7]));
        let bytes = wire(&frame);
        link.inject(&bytes);

        let config = FrameConfig {
            read_chunk_size: 0,
            ..FrameConfig::default()
        };
        let mut reader =
            FrameReader::with_config(Box::new(link.clone()), Box::new(SmcomCodec::new()), config);
        for _ in 0..bytes.len() {
            assert_eq!(reader.fill().unwrap(), 1);
        }
        assert_eq!(drain(&mut reader), (vec![frame], 0));
    }

    #[test]
    fn link_failure_is_transport_error() {
        let link = MockLink::new();
        link.fail_reads(ErrorKind::BrokenPipe);

        let mut reader = reader_for(&link);
        let err = reader.fill().unwrap_err();
        assert!(matches!(err, FrameError::Transport(_)));
        assert!(!err.is_decode_error());
    }
}
