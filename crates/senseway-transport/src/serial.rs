use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::SerialLink;

/// Line rate used by sensor nodes outside of firmware update.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read timeout applied to the port; bounds the listener's polling latency.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Configuration for opening a serial link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: PathBuf,
    /// Initial line rate.
    pub baud_rate: u32,
    /// Maximum time a single read blocks before returning zero bytes.
    pub read_timeout: Duration,
}

impl LinkConfig {
    /// Configuration for `path` at the default line rate.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Serial link backed by an operating-system UART.
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl SerialPortLink {
    /// Open a serial port as 8N1 without flow control.
    pub fn open(config: &LinkConfig) -> Result<Self> {
        let path = config.path.to_string_lossy().into_owned();
        let port = serialport::new(&path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: config.path.clone(),
                source,
            })?;

        info!(path = %path, baud_rate = config.baud_rate, "opened serial port");
        Ok(Self { port })
    }

    /// Wrap an already opened port.
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl SerialLink for SerialPortLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(0),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.port.set_baud_rate(baud_rate)?;
        debug!(baud_rate, "baud rate changed");
        Ok(())
    }

    fn baud_rate(&self) -> Result<u32> {
        Ok(self.port.baud_rate()?)
    }

    fn try_clone(&self) -> Result<Box<dyn SerialLink>> {
        let port = self.port.try_clone()?;
        Ok(Box::new(Self { port }))
    }

    fn name(&self) -> Option<String> {
        self.port.name()
    }
}

/// Names of the serial ports present on this machine.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}
