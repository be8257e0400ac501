use std::time::Duration;

use senseway_frame::FrameError;
use senseway_transport::TransportError;

use crate::firmware::UpdatePhase;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Port-level failure, including a failed write.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame could not be encoded.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// The listener stopped after a port read failure.
    #[error("link broken: {0}")]
    LinkBroken(String),

    /// No matching response arrived in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A response arrived but its status, MAC or layout was not the expected one.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// Command arguments were rejected before anything was written.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The session was shut down.
    #[error("session shut down")]
    Shutdown,

    /// A firmware image source contained no bytes.
    #[error("firmware image is empty")]
    EmptyImage,

    /// A firmware image needs more chunks than a chunk index can address.
    #[error("firmware image too large ({size} bytes, max {max})")]
    ImageTooLarge { size: usize, max: usize },

    /// Reading a firmware image failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A firmware update stopped; `chunk` is set when a transfer failed.
    #[error("firmware update failed during {phase}{}: {source}", chunk_suffix(.chunk))]
    UpdateFailed {
        phase: UpdatePhase,
        chunk: Option<u16>,
        source: Box<SessionError>,
    },
}

impl SessionError {
    /// Whether a firmware chunk attempt that failed this way may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(_) | SessionError::Timeout(_) | SessionError::ProtocolMismatch(_)
        )
    }

    /// Whether the session can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::LinkBroken(_) | SessionError::Shutdown)
    }
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(err) => SessionError::Transport(err),
            other => SessionError::Frame(other),
        }
    }
}

fn chunk_suffix(chunk: &Option<u16>) -> String {
    chunk.map(|chunk| format!(" of chunk {chunk}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, SessionError>;
