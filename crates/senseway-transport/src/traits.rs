use crate::error::Result;

/// A byte link to the sensor bus.
///
/// Reads are bounded: an implementation waits at most its configured read
/// timeout and returns `Ok(0)` when nothing arrived. Callers never see a
/// timeout as an error.
///
/// A link is split into a reader half and a writer half with
/// [`SerialLink::try_clone`]. Both halves drive the same physical port, so a
/// baud-rate change made through one applies to the other.
pub trait SerialLink: Send {
    /// Read up to `buf.len()` bytes, returning `Ok(0)` on read timeout.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Block until written bytes have left the host.
    fn flush(&mut self) -> Result<()>;

    /// Number of received bytes waiting to be read.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Change the line rate of the physical port.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Current line rate of the physical port.
    fn baud_rate(&self) -> Result<u32>;

    /// Create another handle to the same physical port.
    fn try_clone(&self) -> Result<Box<dyn SerialLink>>;

    /// Human-readable port name, if the link has one.
    fn name(&self) -> Option<String> {
        None
    }
}

impl std::fmt::Debug for dyn SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("name", &self.name())
            .finish()
    }
}
