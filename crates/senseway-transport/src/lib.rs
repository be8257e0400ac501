//! Serial link abstraction for SenseWay wired sensor buses.
//!
//! Provides a unified interface over the half-duplex UART link that connects
//! the host controller to its sensor nodes:
//! - [`SerialPortLink`] for real hardware (via the `serialport` crate)
//! - [`MockLink`] for tests and device simulators
//!
//! This is the lowest layer of the driver. Framing and session management
//! build on top of the [`SerialLink`] trait provided here.

pub mod error;
pub mod mock;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use mock::MockLink;
pub use serial::{available_ports, LinkConfig, SerialPortLink, DEFAULT_BAUD_RATE};
pub use traits::SerialLink;
