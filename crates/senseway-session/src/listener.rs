//! Background listener: drains the link and feeds the inbox.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use senseway_frame::{message::message_name, Frame, FrameReader};
use tracing::{debug, error, trace, warn};

/// Reads that return sooner than this with no data count as non-blocking.
const MIN_BLOCKING_READ: Duration = Duration::from_millis(1);

/// A decoded frame tagged with its arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Position in the session's arrival order, starting at 1.
    pub sequence: u64,
    /// When the listener decoded the frame.
    pub received_at: Instant,
    /// The decoded frame.
    pub frame: Frame,
}

/// Counters kept by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames decoded and queued by the listener.
    pub frames_received: u64,
    /// Malformed byte runs dropped by the listener.
    pub decode_errors: u64,
    /// Frames skipped by the correlator because they matched no request.
    pub frames_discarded: u64,
}

/// State shared between the listener thread and the session.
#[derive(Debug, Default)]
pub(crate) struct ListenerShared {
    shutdown: AtomicBool,
    failure: Mutex<Option<String>>,
    frames_received: AtomicU64,
    decode_errors: AtomicU64,
    frames_discarded: AtomicU64,
}

impl ListenerShared {
    pub(crate) fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_failure(&self, reason: String) {
        *self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(reason);
    }

    pub(crate) fn record_discard(&self) {
        self.frames_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> SessionStats {
        SessionStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Start the listener thread.
///
/// The thread owns the inbox sender; when it exits (shutdown or link
/// failure) the sender is dropped and every waiter on the inbox wakes up.
pub(crate) fn spawn(
    reader: FrameReader,
    inbox: Sender<InboundFrame>,
    shared: Arc<ListenerShared>,
    idle_backoff: Duration,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("senseway-listener".to_string())
        .spawn(move || run(reader, inbox, &shared, idle_backoff))
}

fn run(
    mut reader: FrameReader,
    inbox: Sender<InboundFrame>,
    shared: &ListenerShared,
    idle_backoff: Duration,
) {
    debug!(link = ?reader.link().name(), "listener started");
    let mut sequence = 0u64;

    while !shared.is_shutdown() {
        let started = Instant::now();
        match reader.fill() {
            Ok(0) => {
                // Links with a zero read timeout return at once; don't spin on them.
                if started.elapsed() < MIN_BLOCKING_READ {
                    std::thread::sleep(idle_backoff);
                }
                continue;
            }
            Ok(n) => trace!(bytes = n, "read from link"),
            Err(err) => {
                error!(%err, "link read failed, stopping listener");
                shared.set_failure(err.to_string());
                break;
            }
        }

        loop {
            match reader.next_frame() {
                Ok(Some(frame)) => {
                    sequence += 1;
                    debug!(
                        sequence,
                        from = frame.transmitter_id,
                        to = frame.receiver_id,
                        message = message_name(frame.message_id),
                        len = frame.payload.len(),
                        "frame received"
                    );
                    shared.frames_received.fetch_add(1, Ordering::Relaxed);
                    let inbound = InboundFrame {
                        sequence,
                        received_at: Instant::now(),
                        frame,
                    };
                    if inbox.send(inbound).is_err() {
                        debug!("inbox closed, stopping listener");
                        return;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    shared.decode_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(%err, "discarding malformed bytes");
                }
            }
        }
    }

    debug!(frames = sequence, "listener stopped");
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use bytes::{Bytes, BytesMut};
    use crossbeam_channel::unbounded;
    use senseway_frame::{encode_frame, SmcomCodec};
    use senseway_transport::MockLink;

    use super::*;

    fn start(link: &MockLink) -> (JoinHandle<()>, crossbeam_channel::Receiver<InboundFrame>, Arc<ListenerShared>) {
        let reader = FrameReader::new(Box::new(link.clone()), Box::new(SmcomCodec::new()));
        let (tx, rx) = unbounded();
        let shared = Arc::new(ListenerShared::default());
        let handle = spawn(reader, tx, Arc::clone(&shared), Duration::from_millis(1))
            .expect("listener thread should start");
        (handle, rx, shared)
    }

    fn wire(frame: &Frame) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(frame, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn frames_arrive_in_order_with_sequence_numbers() {
        let link = MockLink::new();
        let (handle, rx, shared) = start(&link);

        for i in 0..5u8 {
            link.inject(&wire(&Frame::new(i, 13, 10u8, vec![i])));
        }

        for i in 0..5u8 {
            let inbound = rx.recv_timeout(Duration::from_secs(1)).unwrap();
            assert_eq!(inbound.sequence, u64::from(i) + 1);
            assert_eq!(inbound.frame.transmitter_id, i);
        }

        shared.request_shutdown();
        handle.join().unwrap();
        assert_eq!(shared.stats().frames_received, 5);
    }

    #[test]
    fn malformed_input_does_not_stop_the_loop() {
        let link = MockLink::new();
        let (handle, rx, shared) = start(&link);

        link.inject(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let mut corrupt = wire(&Frame::new(4, 13, 22u8, Bytes::from_static(b"bad")));
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0x55;
        link.inject(&corrupt);
        link.inject(&wire(&Frame::new(4, 13, 10u8, Bytes::from_static(&[3, 1, 7]))));

        let inbound = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(inbound.frame.message_id, 10);
        assert!(shared.stats().decode_errors >= 2);

        shared.request_shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn read_error_stops_listener_and_closes_inbox() {
        let link = MockLink::new();
        let (handle, rx, shared) = start(&link);

        link.fail_reads(ErrorKind::BrokenPipe);
        handle.join().unwrap();

        assert!(shared.failure().is_some());
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(50)),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn shutdown_flag_stops_idle_listener() {
        let link = MockLink::new();
        let (handle, rx, shared) = start(&link);

        shared.request_shutdown();
        handle.join().unwrap();
        assert!(shared.failure().is_none());
        assert!(rx.recv().is_err());
    }
}
