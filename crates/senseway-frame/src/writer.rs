use bytes::BytesMut;
use senseway_transport::SerialLink;
use tracing::trace;

use crate::codec::{Frame, FrameCodec};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete frames to the writer half of a link.
///
/// Every frame is encoded into one buffer and handed to the link in a single
/// `write_all`, so a frame is never split by another writer holding the same
/// `FrameWriter` behind a lock.
pub struct FrameWriter {
    link: Box<dyn SerialLink>,
    codec: Box<dyn FrameCodec>,
    buf: BytesMut,
}

impl FrameWriter {
    /// Create a new frame writer.
    pub fn new(link: Box<dyn SerialLink>, codec: Box<dyn FrameCodec>) -> Self {
        Self {
            link,
            codec,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode, write and flush a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        self.codec.encode(frame, &mut self.buf)?;

        trace!(
            receiver = frame.receiver_id,
            message = frame.message_id,
            bytes = self.buf.len(),
            "writing frame"
        );
        self.link.write_all(&self.buf)?;
        self.link.flush()?;
        Ok(())
    }

    /// Change the line rate of the shared physical port.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.link.set_baud_rate(baud_rate)?;
        Ok(())
    }

    /// Current line rate of the shared physical port.
    pub fn baud_rate(&self) -> Result<u32> {
        Ok(self.link.baud_rate()?)
    }

    /// Borrow the underlying link.
    pub fn link(&self) -> &dyn SerialLink {
        self.link.as_ref()
    }
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter")
            .field("link", &self.link.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use senseway_transport::MockLink;

    use super::*;
    use crate::codec::{decode_frame, SmcomCodec, DEFAULT_MAX_PAYLOAD};
    use crate::error::FrameError;

    fn writer_for(link: &MockLink) -> FrameWriter {
        FrameWriter::new(Box::new(link.clone()), Box::new(SmcomCodec::new()))
    }

    #[test]
    fn write_single_frame() {
        let link = MockLink::new();
        let mut writer = writer_for(&link);
        let frame = Frame::new(13, 4, 10u8, Bytes::new());

        writer.write_frame(&frame).unwrap();

        let writes = link.writes();
        assert_eq!(writes.len(), 1);
        let mut wire = BytesMut::from(writes[0].as_slice());
        assert_eq!(
            decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap(),
            Some(frame)
        );
    }

    #[test]
    fn each_frame_is_one_write() {
        let link = MockLink::new();
        let mut writer = writer_for(&link);

        for i in 0..3u8 {
            writer
                .write_frame(&Frame::new(13, i, 11u8, vec![0u8; 5]))
                .unwrap();
        }

        let writes = link.writes();
        assert_eq!(writes.len(), 3);
        assert!(writes.iter().all(|w| w.len() == 5 + 9));
    }

    #[test]
    fn oversized_payload_is_not_written() {
        let link = MockLink::new();
        let mut writer =
            FrameWriter::new(Box::new(link.clone()), Box::new(SmcomCodec::with_max_payload(8)));

        let err = writer
            .write_frame(&Frame::new(13, 4, 2u8, vec![0u8; 9]))
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(link.writes().is_empty());
    }

    #[test]
    fn write_failure_surfaces() {
        let link = MockLink::new();
        link.fail_writes(true);
        let mut writer = writer_for(&link);

        let err = writer
            .write_frame(&Frame::new(13, 4, 10u8, Bytes::new()))
            .unwrap_err();
        assert!(matches!(err, FrameError::Transport(_)));
    }

    #[test]
    fn baud_rate_passthrough() {
        let link = MockLink::new();
        let mut writer = writer_for(&link);

        assert_eq!(writer.baud_rate().unwrap(), 115_200);
        writer.set_baud_rate(1_000_000).unwrap();
        assert_eq!(link.current_baud_rate(), 1_000_000);
    }
}
