//! Session layer for SenseWay wired sensor buses.
//!
//! A [`Session`] owns one serial link. A background listener decodes every
//! frame the link delivers into an inbox; callers exchange requests and
//! responses through a [`Conversation`], which serialises access to the bus
//! and matches responses to requests. On top of that sit the node commands
//! (version, MAC, telemetry, batch measurements, addressing) and the
//! chunked firmware update.

pub mod commands;
pub mod config;
pub mod correlator;
pub mod error;
pub mod firmware;
pub mod listener;
pub mod mac;
pub mod measurement;
pub mod session;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use commands::{DiscoveredNode, FirmwareVersion};
pub use config::{CorrelationMode, SessionConfig};
pub use correlator::{BaudRateGuard, Conversation, ResponseMatch};
pub use error::{Result, SessionError};
pub use firmware::{
    FirmwareImage, NoopObserver, RetryPolicy, UpdateConfig, UpdateEvent, UpdateObserver,
    UpdatePhase, UpdateReport,
};
pub use listener::{InboundFrame, SessionStats};
pub use mac::MacAddress;
pub use measurement::{
    measurement_timeout, AccelRange, BatchMeasurement, MeasurementRequest, SampleRate,
};
pub use session::Session;
pub use telemetry::{Axes, Metric, TelemetrySnapshot};
