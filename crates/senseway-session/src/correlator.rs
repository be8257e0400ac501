//! Request/response correlation over the shared inbox.

use std::sync::MutexGuard;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use senseway_frame::{message::message_name, Frame, BOOTLOADER_ID, BROADCAST_ID};
use tracing::{debug, warn};

use crate::config::CorrelationMode;
use crate::error::{Result, SessionError};
use crate::listener::InboundFrame;
use crate::session::Session;

/// Which inbound frames count as the response to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseMatch {
    /// Required message id, if any.
    pub message_id: Option<u8>,
    /// Required sender, if any.
    pub transmitter_id: Option<u8>,
}

impl ResponseMatch {
    /// Accept any frame.
    pub const ANY: ResponseMatch = ResponseMatch {
        message_id: None,
        transmitter_id: None,
    };

    /// Accept frames carrying `message_id` from any sender.
    pub fn message(message_id: impl Into<u8>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            transmitter_id: None,
        }
    }

    /// Additionally require the frame to come from `transmitter_id`.
    pub fn from_device(mut self, transmitter_id: u8) -> Self {
        self.transmitter_id = Some(transmitter_id);
        self
    }

    /// Expected response to a request sent to `receiver_id`.
    ///
    /// Replies echo the request's message id. The sender is pinned only for
    /// unicast requests to application ids; broadcast and bootloader
    /// requests are answered from addresses the host cannot predict.
    pub fn for_request(receiver_id: u8, message_id: impl Into<u8>) -> Self {
        let expect = Self::message(message_id);
        match receiver_id {
            BROADCAST_ID | BOOTLOADER_ID => expect,
            id => expect.from_device(id),
        }
    }

    /// Whether `frame` satisfies this match.
    pub fn matches(&self, frame: &Frame) -> bool {
        self.message_id.is_none_or(|id| id == frame.message_id)
            && self
                .transmitter_id
                .is_none_or(|id| id == frame.transmitter_id)
    }
}

/// Exclusive use of the bus for one exchange.
///
/// Only one conversation exists per session at a time; [`Session::conversation`]
/// blocks until the current holder drops its guard. Multi-frame protocols
/// (measurement download, firmware update) keep one conversation for their
/// whole exchange so no other caller can interleave requests.
pub struct Conversation<'s> {
    pub(crate) session: &'s Session,
    _slot: MutexGuard<'s, ()>,
}

impl<'s> Conversation<'s> {
    pub(crate) fn new(session: &'s Session, slot: MutexGuard<'s, ()>) -> Self {
        Self {
            session,
            _slot: slot,
        }
    }

    /// The session this conversation belongs to.
    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Write one frame addressed to `receiver_id` without waiting for a reply.
    pub fn send(&mut self, receiver_id: u8, message_id: impl Into<u8>, payload: &[u8]) -> Result<()> {
        self.session.ensure_alive()?;
        let frame = Frame::new(
            self.session.config().host_id,
            receiver_id,
            message_id,
            payload.to_vec(),
        );
        debug!(
            to = receiver_id,
            message = message_name(frame.message_id),
            len = payload.len(),
            "sending frame"
        );
        self.session.write_frame(&frame)
    }

    /// Wait for the next frame satisfying `expect`.
    ///
    /// In [`CorrelationMode::Filtered`] non-matching frames are dropped and
    /// the wait continues until the original deadline. In
    /// [`CorrelationMode::Fifo`] the next frame is returned as is.
    pub fn recv(&mut self, expect: ResponseMatch, timeout: Duration) -> Result<Frame> {
        self.recv_inbound(expect, timeout).map(|inbound| inbound.frame)
    }

    /// Like [`Conversation::recv`], keeping the arrival tag.
    pub fn recv_inbound(&mut self, expect: ResponseMatch, timeout: Duration) -> Result<InboundFrame> {
        let deadline = Instant::now() + timeout;
        let filtered = self.session.config().correlation == CorrelationMode::Filtered;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.session.inbox().recv_timeout(remaining) {
                Ok(inbound) => {
                    if !filtered || expect.matches(&inbound.frame) {
                        return Ok(inbound);
                    }
                    self.session.listener_shared().record_discard();
                    debug!(
                        sequence = inbound.sequence,
                        from = inbound.frame.transmitter_id,
                        message = message_name(inbound.frame.message_id),
                        "discarding frame that matches no pending request"
                    );
                }
                Err(RecvTimeoutError::Timeout) => return Err(SessionError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(self.session.closed_error()),
            }
        }
    }

    /// Write a request and wait for its response.
    ///
    /// The response is matched by message id (and sender for unicast
    /// requests) in filtered mode only. Callers still verify status bytes and
    /// echoed addresses themselves.
    pub fn send_and_wait(
        &mut self,
        receiver_id: u8,
        message_id: impl Into<u8>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Frame> {
        let message_id = message_id.into();
        self.send(receiver_id, message_id, payload)?;
        self.recv(ResponseMatch::for_request(receiver_id, message_id), timeout)
    }

    /// Drop every frame already queued. Returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        loop {
            match self.session.inbox().try_recv() {
                Ok(inbound) => {
                    dropped += 1;
                    self.session.listener_shared().record_discard();
                    debug!(sequence = inbound.sequence, "dropping stale frame");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return dropped,
            }
        }
    }

    /// Current line rate of the port.
    pub fn baud_rate(&self) -> Result<u32> {
        self.session.baud_rate()
    }

    /// Switch the port to `baud_rate` until the returned guard is dropped
    /// or restored.
    pub fn raise_baud_rate(&mut self, baud_rate: u32) -> Result<BaudRateGuard<'s>> {
        BaudRateGuard::raise(self.session, baud_rate)
    }
}

impl std::fmt::Debug for Conversation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("host_id", &self.session.config().host_id)
            .finish()
    }
}

/// Restores the port's previous line rate when dropped.
///
/// Covers every exit path of the code holding it, including early returns
/// through `?` and panics.
#[must_use = "the previous baud rate is restored as soon as the guard is dropped"]
pub struct BaudRateGuard<'s> {
    session: &'s Session,
    previous: u32,
    active: bool,
}

impl<'s> BaudRateGuard<'s> {
    pub(crate) fn raise(session: &'s Session, baud_rate: u32) -> Result<Self> {
        let previous = session.baud_rate()?;
        let guard = Self {
            session,
            previous,
            active: true,
        };
        session.set_baud_rate(baud_rate)?;
        debug!(from = previous, to = baud_rate, "baud rate raised");
        Ok(guard)
    }

    /// Line rate that will be restored.
    pub fn previous(&self) -> u32 {
        self.previous
    }

    /// Restore the previous line rate now, reporting failure.
    pub fn restore(mut self) -> Result<()> {
        self.active = false;
        self.session.set_baud_rate(self.previous)
    }
}

impl Drop for BaudRateGuard<'_> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        match self.session.set_baud_rate(self.previous) {
            Ok(()) => debug!(baud_rate = self.previous, "baud rate restored"),
            Err(err) => warn!(%err, baud_rate = self.previous, "failed to restore baud rate"),
        }
    }
}
