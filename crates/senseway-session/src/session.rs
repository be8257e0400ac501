use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use senseway_frame::{Frame, FrameCodec, FrameReader, FrameWriter, SmcomCodec};
use senseway_transport::{LinkConfig, SerialLink, SerialPortLink};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::correlator::Conversation;
use crate::error::{Result, SessionError};
use crate::listener::{self, InboundFrame, ListenerShared, SessionStats};

/// A live connection to a SenseWay bus.
///
/// Owns the link for its whole lifetime: the reader half is drained by a
/// background listener thread into an inbox, the writer half sits behind a
/// write gate. The session is `Sync`; any number of threads may issue
/// requests through `&Session`, and they are served one conversation at a
/// time.
pub struct Session {
    config: SessionConfig,
    writer: Mutex<FrameWriter>,
    inbox: Receiver<InboundFrame>,
    conversation: Mutex<()>,
    listener: Arc<ListenerShared>,
    listener_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Open a serial port and start a session on it.
    pub fn open(link: &LinkConfig, config: SessionConfig) -> Result<Self> {
        let port = SerialPortLink::open(link)?;
        Self::with_link(Box::new(port), config)
    }

    /// Start a session on an already open link using the reference codec.
    pub fn with_link(link: Box<dyn SerialLink>, config: SessionConfig) -> Result<Self> {
        let codec = SmcomCodec::from_config(&config.frame);
        Self::with_codec(link, codec, config)
    }

    /// Start a session with a caller-supplied frame codec.
    ///
    /// The codec is cloned so the reader and writer halves each own one;
    /// decode state is only ever touched by the listener.
    pub fn with_codec<C>(link: Box<dyn SerialLink>, codec: C, config: SessionConfig) -> Result<Self>
    where
        C: FrameCodec + Clone + 'static,
    {
        let reader_link = link.try_clone()?;
        let reader = FrameReader::with_config(reader_link, Box::new(codec.clone()), config.frame.clone());
        let writer = FrameWriter::new(link, Box::new(codec));

        let (tx, rx) = unbounded();
        let shared = Arc::new(ListenerShared::default());
        let handle = listener::spawn(reader, tx, Arc::clone(&shared), config.idle_backoff)?;

        debug!(host_id = config.host_id, correlation = ?config.correlation, "session started");
        Ok(Self {
            config,
            writer: Mutex::new(writer),
            inbox: rx,
            conversation: Mutex::new(()),
            listener: shared,
            listener_thread: Mutex::new(Some(handle)),
        })
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Claim the bus for one exchange, blocking while another caller holds it.
    pub fn conversation(&self) -> Conversation<'_> {
        let slot = self
            .conversation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Conversation::new(self, slot)
    }

    /// Send a request and wait for its response in one conversation.
    pub fn send_and_wait(
        &self,
        receiver_id: u8,
        message_id: impl Into<u8>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Frame> {
        self.conversation()
            .send_and_wait(receiver_id, message_id, payload, timeout)
    }

    /// Take the next frame off the inbox without any matching.
    ///
    /// Meant for passive monitoring; returns `Ok(None)` when nothing arrives
    /// within `timeout`.
    pub fn recv(&self, timeout: Duration) -> Result<Option<InboundFrame>> {
        let _slot = self.conversation();
        match self.inbox.recv_timeout(timeout) {
            Ok(inbound) => Ok(Some(inbound)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.closed_error()),
        }
    }

    /// Listener counters.
    pub fn stats(&self) -> SessionStats {
        self.listener.stats()
    }

    /// Whether the listener is still draining the link.
    pub fn is_alive(&self) -> bool {
        !self.listener.is_shutdown() && self.listener.failure().is_none()
    }

    /// Stop the listener and wait for it to exit.
    ///
    /// Every caller blocked on a response returns [`SessionError::Shutdown`].
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        self.listener.request_shutdown();
        let handle = self
            .listener_thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("listener thread panicked");
            }
            debug!("session shut down");
        }
    }

    pub(crate) fn inbox(&self) -> &Receiver<InboundFrame> {
        &self.inbox
    }

    pub(crate) fn listener_shared(&self) -> &ListenerShared {
        &self.listener
    }

    /// Error for an operation on a session whose listener has stopped.
    pub(crate) fn closed_error(&self) -> SessionError {
        match self.listener.failure() {
            Some(reason) => SessionError::LinkBroken(reason),
            None => SessionError::Shutdown,
        }
    }

    pub(crate) fn ensure_alive(&self) -> Result<()> {
        if self.listener.failure().is_some() || self.listener.is_shutdown() {
            return Err(self.closed_error());
        }
        Ok(())
    }

    pub(crate) fn write_frame(&self, frame: &Frame) -> Result<()> {
        self.lock_writer().write_frame(frame)?;
        Ok(())
    }

    pub(crate) fn baud_rate(&self) -> Result<u32> {
        Ok(self.lock_writer().baud_rate()?)
    }

    pub(crate) fn set_baud_rate(&self, baud_rate: u32) -> Result<()> {
        self.lock_writer().set_baud_rate(baud_rate)?;
        Ok(())
    }

    fn lock_writer(&self) -> MutexGuard<'_, FrameWriter> {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host_id", &self.config.host_id)
            .field("correlation", &self.config.correlation)
            .field("alive", &self.is_alive())
            .finish()
    }
}
