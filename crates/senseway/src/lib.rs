//! Host-side driver for SenseWay wired vibration sensors.
//!
//! A controller talks to its sensor nodes over one half-duplex serial bus.
//! This crate bundles the layers of the driver:
//!
//! - [`transport`]: serial link abstraction (real UART and in-memory mock)
//! - [`frame`]: addressed, checksummed framing and the message table
//! - [`session`]: listener, request correlation, node commands and
//!   firmware update
//!
//! ```no_run
//! use senseway::{LinkConfig, Session, SessionConfig};
//!
//! let session = Session::open(&LinkConfig::new("/dev/ttyUSB0"), SessionConfig::default())?;
//! let version = session.get_version(4)?;
//! println!("node 4 runs {version}");
//! # Ok::<(), senseway::SessionError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use senseway_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use senseway_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use senseway_session::*;
}

pub use senseway_frame::{Frame, MessageId, Status, BOOTLOADER_ID, BROADCAST_ID, DEFAULT_HOST_ID};
pub use senseway_session::{
    CorrelationMode, FirmwareImage, FirmwareVersion, MacAddress, Session, SessionConfig,
    SessionError, UpdateConfig,
};
pub use senseway_transport::{LinkConfig, SerialLink};
