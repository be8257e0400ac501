use senseway_transport::TransportError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream did not start with the frame magic; bytes were skipped.
    #[error("invalid frame magic (expected 0x534D \"SM\"), discarded {discarded} bytes")]
    InvalidMagic { discarded: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame trailer does not match the computed checksum.
    #[error("checksum mismatch (frame {received:#06x}, computed {computed:#06x})")]
    ChecksumMismatch { received: u16, computed: u16 },

    /// The link failed while reading or writing frames.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// Whether the error came from malformed input rather than the link.
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, FrameError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
