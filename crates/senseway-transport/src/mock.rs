//! In-memory link for tests and device simulators.
//!
//! Every clone of a [`MockLink`] shares one simulated port: bytes injected
//! with [`MockLink::inject`] are readable from any handle, and every write is
//! recorded for inspection. A responder callback can answer writes
//! synchronously, which is how simulated sensor nodes are built.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::serial::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use crate::traits::SerialLink;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct MockState {
    rx: VecDeque<u8>,
    wire: Vec<u8>,
    writes: Vec<Vec<u8>>,
    baud_rate: u32,
    baud_history: Vec<u32>,
    fail_writes: bool,
    fail_baud_changes: bool,
    read_error: Option<ErrorKind>,
    write_delay: Option<Duration>,
    closed: bool,
}

struct Shared {
    state: Mutex<MockState>,
    readable: Condvar,
    responder: Mutex<Option<Responder>>,
}

/// Simulated serial port.
#[derive(Clone)]
pub struct MockLink {
    shared: Arc<Shared>,
    read_timeout: Duration,
}

impl MockLink {
    /// Create a link at the default bus rate.
    pub fn new() -> Self {
        Self::with_baud_rate(DEFAULT_BAUD_RATE)
    }

    /// Create a link starting at `baud_rate`.
    pub fn with_baud_rate(baud_rate: u32) -> Self {
        let state = MockState {
            baud_rate,
            ..MockState::default()
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                readable: Condvar::new(),
                responder: Mutex::new(None),
            }),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Make bytes available to readers, as if the device had sent them.
    pub fn inject(&self, bytes: &[u8]) {
        let mut state = self.lock();
        state.rx.extend(bytes.iter().copied());
        drop(state);
        self.shared.readable.notify_all();
    }

    /// Answer every write with the bytes returned by `responder`.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        *lock_responder(&self.shared) = Some(Box::new(responder));
    }

    /// Make subsequent writes fail with a broken-pipe error.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make subsequent line-rate changes fail.
    pub fn fail_baud_changes(&self, fail: bool) {
        self.lock().fail_baud_changes = fail;
    }

    /// Make subsequent reads fail with `kind`.
    pub fn fail_reads(&self, kind: ErrorKind) {
        self.lock().read_error = Some(kind);
        self.shared.readable.notify_all();
    }

    /// Split every write in two with `delay` between the halves.
    pub fn set_write_delay(&self, delay: Duration) {
        self.lock().write_delay = Some(delay);
    }

    /// Mark the port as unplugged; reads and writes fail afterwards.
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.readable.notify_all();
    }

    /// One entry per successful `write_all` call.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Every written byte in the order it reached the wire.
    pub fn wire(&self) -> Vec<u8> {
        self.lock().wire.clone()
    }

    /// Every baud rate set through any handle, in order.
    pub fn baud_history(&self) -> Vec<u32> {
        self.lock().baud_history.clone()
    }

    /// Current simulated line rate.
    pub fn current_baud_rate(&self) -> u32 {
        self.lock().baud_rate
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockLink")
            .field("pending_rx", &state.rx.len())
            .field("writes", &state.writes.len())
            .field("baud_rate", &state.baud_rate)
            .finish()
    }
}

fn lock_responder(shared: &Shared) -> MutexGuard<'_, Option<Responder>> {
    shared
        .responder
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SerialLink for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock();
        if state.rx.is_empty() && state.read_error.is_none() && !state.closed {
            state = self
                .shared
                .readable
                .wait_timeout(state, self.read_timeout)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
        if let Some(kind) = state.read_error {
            return Err(std::io::Error::new(kind, "simulated read failure").into());
        }
        if state.closed {
            return Err(TransportError::Closed);
        }

        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let delay = {
            let state = self.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            if state.fail_writes {
                return Err(std::io::Error::from(ErrorKind::BrokenPipe).into());
            }
            state.write_delay
        };

        match delay {
            Some(delay) => {
                let (head, tail) = bytes.split_at(bytes.len() / 2);
                self.lock().wire.extend_from_slice(head);
                std::thread::sleep(delay);
                self.lock().wire.extend_from_slice(tail);
            }
            None => self.lock().wire.extend_from_slice(bytes),
        }
        self.lock().writes.push(bytes.to_vec());

        let reply = lock_responder(&self.shared)
            .as_mut()
            .map(|responder| responder(bytes))
            .unwrap_or_default();
        if !reply.is_empty() {
            self.inject(&reply);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        Ok(state.rx.len())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        let mut state = self.lock();
        if state.fail_baud_changes {
            return Err(std::io::Error::new(ErrorKind::Unsupported, "simulated baud rate failure").into());
        }
        state.baud_rate = baud_rate;
        state.baud_history.push(baud_rate);
        Ok(())
    }

    fn baud_rate(&self) -> Result<u32> {
        Ok(self.lock().baud_rate)
    }

    fn try_clone(&self) -> Result<Box<dyn SerialLink>> {
        Ok(Box::new(self.clone()))
    }

    fn name(&self) -> Option<String> {
        Some("mock".to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn injected_bytes_are_readable_from_clones() {
        let link = MockLink::new();
        let mut reader = link.try_clone().unwrap();

        link.inject(b"abc");
        assert_eq!(reader.bytes_available().unwrap(), 3);

        let mut buf = [0u8; 8];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abc");
        assert_eq!(reader.bytes_available().unwrap(), 0);
    }

    #[test]
    fn empty_read_times_out_with_zero_bytes() {
        let mut link = MockLink::new();
        let start = Instant::now();
        let mut buf = [0u8; 4];
        assert_eq!(link.read(&mut buf).unwrap(), 0);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn blocked_read_wakes_on_inject() {
        let link = MockLink::new();
        let mut reader = link.clone();
        reader.read_timeout = Duration::from_secs(5);

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 4];
            let n = reader.read(&mut buf).unwrap();
            buf[..n].to_vec()
        });

        thread::sleep(Duration::from_millis(20));
        link.inject(&[7, 8]);
        assert_eq!(handle.join().unwrap(), vec![7, 8]);
    }

    #[test]
    fn responder_answers_writes() {
        let mut link = MockLink::new();
        link.set_responder(|written| written.iter().rev().copied().collect());

        link.write_all(&[1, 2, 3]).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(link.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [3, 2, 1]);
        assert_eq!(link.writes(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn baud_rate_is_shared_between_handles() {
        let link = MockLink::new();
        let mut writer = link.try_clone().unwrap();

        writer.set_baud_rate(1_000_000).unwrap();
        assert_eq!(link.current_baud_rate(), 1_000_000);
        assert_eq!(link.baud_history(), vec![1_000_000]);
    }

    #[test]
    fn baud_changes_can_be_made_to_fail() {
        let link = MockLink::new();
        let mut writer = link.try_clone().unwrap();

        link.fail_baud_changes(true);
        assert!(writer.set_baud_rate(1_000_000).is_err());
        assert_eq!(link.current_baud_rate(), DEFAULT_BAUD_RATE);
        assert!(link.baud_history().is_empty());
    }

    #[test]
    fn failures_are_reported() {
        let mut link = MockLink::new();
        link.fail_writes(true);
        assert!(matches!(
            link.write_all(b"x"),
            Err(TransportError::Io(err)) if err.kind() == ErrorKind::BrokenPipe
        ));

        link.fail_reads(ErrorKind::BrokenPipe);
        let mut buf = [0u8; 1];
        assert!(link.read(&mut buf).is_err());

        let mut other = MockLink::new();
        other.close();
        assert!(matches!(other.bytes_available(), Err(TransportError::Closed)));
    }
}
